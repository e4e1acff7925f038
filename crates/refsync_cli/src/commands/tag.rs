use crate::TagAction;
use crate::commands::branch::RefRow;
use crate::commands::shared::{Session, print_rows};

pub(crate) async fn handle_tag(
    action: TagAction,
    session: &Session,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TagAction::Get { name } => {
            let state = session
                .sync
                .get_tag(&name)
                .await?
                .ok_or_else(|| format!("Tag '{name}' not found"))?;
            print_rows(&[RefRow::from(state)], session.output)?;
        }
    }
    Ok(())
}
