//! Server-side proxy names
//!
//! The server knows each proxy as `<user>.<name>` when the client has a user
//! set, and as the bare name otherwise.

/// Prefix `name` with `user`, if any
pub fn add_user_prefix(user: &str, name: &str) -> String {
    if user.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", user, name)
    }
}

/// Remove one `<user>.` prefix from `name`, if present
pub fn strip_user_prefix<'a>(user: &str, name: &'a str) -> &'a str {
    if user.is_empty() {
        return name;
    }
    name.strip_prefix(user)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(name)
}

/// Server-side name of the proxy a visitor connects to
///
/// The target belongs to `server_user` when set, otherwise to our own user.
pub fn build_target_server_proxy_name(user: &str, server_user: &str, server_name: &str) -> String {
    if server_user.is_empty() {
        add_user_prefix(user, server_name)
    } else {
        add_user_prefix(server_user, server_name)
    }
}
