pub(crate) mod branch;
pub(crate) mod commits;
pub(crate) mod meta;
pub(crate) mod shared;
pub(crate) mod tag;
