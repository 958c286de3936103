use std::time::Duration;

pub(crate) mod backend;
pub(crate) mod handoff;
pub(crate) mod memory;

/// Window in which an unclaimed credential stays readable. Not exposed to
/// callers; the desktop poller is expected to give up once this elapses.
pub(crate) const TOKEN_TTL: Duration = Duration::from_secs(120);

/// Namespace prefix applied to every token before it is used as a key, so
/// hand-off entries cannot collide with unrelated data in a shared key space.
pub(crate) const KEY_PREFIX: &str = "handoff:token:";
