pub(crate) mod handoff;
pub(crate) mod router;
