//! Codec for PostgreSQL `aclitem` entries such as `alice=rw/bob`.
//!
//! An entry reads `grantee=privileges/grantor`. An empty grantee is the `PUBLIC` pseudo-role.
//! A `*` after a privilege code marks the grant option and is not itself a privilege.

use pg_escape::quote_identifier;
use pgdiff_config::shared::PrivilegeStyle;

/// Marker that follows a privilege code granted `WITH GRANT OPTION`.
const GRANT_OPTION_MARKER: char = '*';

/// Name rendered for the grantee of an entry with an empty role.
pub const PUBLIC_ROLE: &str = "PUBLIC";

/// A decoded `aclitem`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclEntry {
    /// Grantee. Empty for `PUBLIC`.
    pub role: String,
    /// Privilege codes in first-seen order, without duplicates.
    pub permissions: Vec<char>,
    /// Role that granted the privileges, empty when the entry has none.
    pub grantor: String,
}

impl AclEntry {
    pub fn is_public(&self) -> bool {
        self.role.is_empty()
    }

    /// Returns the grantee as it appears in a `GRANT ... TO` clause.
    pub fn grantee_sql(&self) -> String {
        if self.is_public() {
            PUBLIC_ROLE.to_string()
        } else {
            quote_identifier(&self.role).into_owned()
        }
    }

    /// Returns the privileges present here and missing from `other`, in this entry's order.
    pub fn permissions_missing_from(&self, other: &AclEntry) -> Vec<char> {
        self.permissions
            .iter()
            .copied()
            .filter(|code| !other.permissions.contains(code))
            .collect()
    }
}

/// Decodes one `aclitem` entry.
///
/// Malformed input (no `=` separating grantee and privileges) decodes to an empty role with no
/// permissions instead of failing, so a single bad catalog value cannot abort a run.
pub fn decode_acl_entry(entry: &str) -> AclEntry {
    let Some((role, rest)) = split_grantee(entry) else {
        return AclEntry::default();
    };

    let (codes, grantor) = match rest.split_once('/') {
        Some((codes, grantor)) => (codes, unquote_role(grantor)),
        None => (rest, String::new()),
    };

    let mut permissions: Vec<char> = Vec::with_capacity(codes.len());
    for code in codes.chars() {
        if code == GRANT_OPTION_MARKER || permissions.contains(&code) {
            continue;
        }
        permissions.push(code);
    }

    AclEntry {
        role,
        permissions,
        grantor,
    }
}

/// Splits `entry` at the `=` that ends the grantee, honouring a double-quoted grantee.
fn split_grantee(entry: &str) -> Option<(String, &str)> {
    let Some(quoted) = entry.strip_prefix('"') else {
        return entry
            .split_once('=')
            .map(|(role, rest)| (role.to_string(), rest));
    };

    let mut role = String::new();
    let mut chars = quoted.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if c != '"' {
            role.push(c);
            continue;
        }

        if let Some((_, '"')) = chars.peek() {
            role.push('"');
            chars.next();
            continue;
        }

        return quoted[index + 1..]
            .strip_prefix('=')
            .map(|rest| (role, rest));
    }

    None
}

fn unquote_role(role: &str) -> String {
    match role
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => role.to_string(),
    }
}

/// Maps a privilege code to its SQL keyword.
pub fn privilege_keyword(code: char) -> Option<&'static str> {
    let keyword = match code {
        'r' => "SELECT",
        'w' => "UPDATE",
        'a' => "INSERT",
        'd' => "DELETE",
        'D' => "TRUNCATE",
        'x' => "REFERENCES",
        't' => "TRIGGER",
        'X' => "EXECUTE",
        'U' => "USAGE",
        'C' => "CREATE",
        'c' => "CONNECT",
        'T' => "TEMPORARY",
        'm' => "MAINTAIN",
        's' => "SET",
        'A' => "ALTER SYSTEM",
        _ => return None,
    };

    Some(keyword)
}

/// Joins privilege codes with `, ` for a GRANT or REVOKE statement.
///
/// Under [`PrivilegeStyle::Keyword`] codes without a keyword are written as-is.
pub fn render_permissions(permissions: &[char], style: PrivilegeStyle) -> String {
    permissions
        .iter()
        .map(|&code| match style {
            PrivilegeStyle::Code => code.to_string(),
            PrivilegeStyle::Keyword => privilege_keyword(code)
                .map(str::to_string)
                .unwrap_or_else(|| code.to_string()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_role() {
        let entry = decode_acl_entry("alice=r/bob");

        assert_eq!(entry.role, "alice");
        assert_eq!(entry.permissions, vec!['r']);
        assert_eq!(entry.grantor, "bob");
    }

    #[test]
    fn empty_role_is_public() {
        let entry = decode_acl_entry("=r/bob");

        assert!(entry.is_public());
        assert_eq!(entry.permissions, vec!['r']);
        assert_eq!(entry.grantee_sql(), "PUBLIC");
    }

    #[test]
    fn entry_without_equals_is_empty() {
        let entry = decode_acl_entry("bob");

        assert_eq!(entry.role, "");
        assert!(entry.permissions.is_empty());
    }

    #[test]
    fn grant_option_marker_is_skipped() {
        let entry = decode_acl_entry("alice=r*w/bob");

        assert_eq!(entry.permissions, vec!['r', 'w']);
    }

    #[test]
    fn duplicate_codes_are_kept_once() {
        let entry = decode_acl_entry("alice=rwr/bob");

        assert_eq!(entry.permissions, vec!['r', 'w']);
    }

    #[test]
    fn quoted_role_is_unquoted() {
        let entry = decode_acl_entry(r#""report ""ro"" user"=r/"Admin""#);

        assert_eq!(entry.role, r#"report "ro" user"#);
        assert_eq!(entry.grantor, "Admin");
        assert_eq!(entry.grantee_sql(), r#""report ""ro"" user""#);
    }

    #[test]
    fn quoted_role_may_contain_separators() {
        let entry = decode_acl_entry(r#""a=b/c"=rw/bob"#);

        assert_eq!(entry.role, "a=b/c");
        assert_eq!(entry.permissions, vec!['r', 'w']);
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        assert_eq!(decode_acl_entry("\"alice=r/bob"), AclEntry::default());
    }

    #[test]
    fn entry_without_grantor_keeps_codes() {
        let entry = decode_acl_entry("alice=arw");

        assert_eq!(entry.permissions, vec!['a', 'r', 'w']);
        assert_eq!(entry.grantor, "");
    }

    #[test]
    fn missing_permissions_preserve_order() {
        let source = decode_acl_entry("alice=arwd/bob");
        let target = decode_acl_entry("alice=rx/bob");

        assert_eq!(source.permissions_missing_from(&target), vec!['a', 'w', 'd']);
        assert_eq!(target.permissions_missing_from(&source), vec!['x']);
    }

    #[test]
    fn renders_codes_and_keywords() {
        let permissions = ['r', 'w', 'A', '?'];

        assert_eq!(
            render_permissions(&permissions, PrivilegeStyle::Code),
            "r, w, A, ?"
        );
        assert_eq!(
            render_permissions(&permissions, PrivilegeStyle::Keyword),
            "SELECT, UPDATE, ALTER SYSTEM, ?"
        );
    }
}
