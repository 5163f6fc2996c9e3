//! AT-command allow/block lists (§4.4). Two independent ACL sets apply
//! depending on who originated the command: `mqtt` for commands issued
//! locally (by us, towards the logger) and `tsun` for commands the cloud
//! sends that we're about to forward.

#[derive(Debug, Clone, Default)]
pub struct Acl {
    pub allow: Vec<String>,
    pub block: Vec<String>,
}

impl Acl {
    /// A command is forbidden if it doesn't start with any allowed prefix,
    /// or if it starts with any blocked prefix — block always wins over a
    /// matching allow entry, and an empty allow list permits everything
    /// not explicitly blocked.
    pub fn forbidden(&self, cmd: &str) -> bool {
        let allowed = self.allow.is_empty() || self.allow.iter().any(|p| cmd.starts_with(p.as_str()));
        let blocked = self.block.iter().any(|p| cmd.starts_with(p.as_str()));
        !allowed || blocked
    }
}
