//! Column-level privileges (`pg_attribute.attacl`).
//!
//! Each catalog row is one `aclitem` of one column. Rows are keyed by `compare_name`
//! (`[schema.]relkind.relation.column`) and then by grantee, so both sides line up per
//! column and role. Matching rows are reconciled with at most one GRANT and one REVOKE.

use std::any::Any;
use std::cmp::Ordering;

use pg_escape::quote_identifier;
use pgdiff_config::shared::SchemaScope;
use tracing::warn;

use crate::acl::{AclEntry, decode_acl_entry, render_permissions};
use crate::catalog::CatalogQuery;
use crate::diff::DiffContext;
use crate::diff::comparator::{Comparator, Cursor, compare_cursor_keys, downcast_peer};
use crate::diff::output::{MergeBranch, Statement, StatementSink};
use crate::error::PgDiffResult;
use crate::objects::ObjectKind;
use crate::types::CatalogRow;

pub const SCHEMA_NAME: &str = "schema_name";
pub const COMPARE_NAME: &str = "compare_name";
pub const RELATION_TYPE: &str = "type";
pub const RELATIONSHIP_NAME: &str = "relationship_name";
pub const ATTRIBUTE_NAME: &str = "attribute_name";
pub const ATTRIBUTE_ACL: &str = "attribute_acl";

const SELECT_PREFIX: &str = r#"
SELECT
    n.nspname::text AS schema_name
    , "#;

const SELECT_BODY: &str = r#"c.relkind::text || '.' || c.relname::text || '.' || a.attname::text AS compare_name
    , CASE c.relkind
        WHEN 'r' THEN 'TABLE'
        WHEN 'v' THEN 'VIEW'
        WHEN 'f' THEN 'FOREIGN TABLE'
      END AS type
    , c.relname::text AS relationship_name
    , a.attname::text AS attribute_name
    , a.attacl::text AS attribute_acl
FROM pg_catalog.pg_class c
LEFT JOIN pg_catalog.pg_namespace n ON (n.oid = c.relnamespace)
INNER JOIN (
    SELECT attname, unnest(attacl) AS attacl, attrelid
    FROM pg_catalog.pg_attribute
    WHERE NOT attisdropped AND attacl IS NOT NULL
) AS a ON (a.attrelid = c.oid)
WHERE c.relkind IN ('r', 'v', 'f')
"#;

const WILDCARD_FILTER: &str = r#"AND n.nspname NOT LIKE 'pg_%'
AND n.nspname <> 'information_schema'
"#;

const NAMED_SCHEMA_FILTER: &str = "AND n.nspname = $1\n";

/// Builds the column ACL query for `scope`.
///
/// Under the wildcard scope `compare_name` is prefixed with the schema and system schemas are
/// excluded. A named scope is bound as `$1`.
pub fn catalog_query(scope: &SchemaScope) -> CatalogQuery {
    match scope.name() {
        None => CatalogQuery::new(format!(
            "{SELECT_PREFIX}n.nspname::text || '.' || {SELECT_BODY}{WILDCARD_FILTER}"
        )),
        Some(schema) => CatalogQuery::new(format!(
            "{SELECT_PREFIX}{SELECT_BODY}{NAMED_SCHEMA_FILTER}"
        ))
        .with_param(schema),
    }
}

#[derive(Debug, Clone)]
struct GrantAttributeEntry {
    row: CatalogRow,
    acl: AclEntry,
}

impl GrantAttributeEntry {
    fn new(row: CatalogRow) -> Self {
        let acl = decode_acl_entry(row.get(ATTRIBUTE_ACL));
        Self { row, acl }
    }

    fn sort_key(&self) -> (&str, &str) {
        (self.row.get(COMPARE_NAME), self.acl.role.as_str())
    }

    /// Sort key refined by grantor and the raw item, so that several items of one grantee on
    /// one column line up the same way on both sides regardless of catalog order.
    fn merge_order(&self) -> (&str, &str, &str, &str) {
        (
            self.row.get(COMPARE_NAME),
            self.acl.role.as_str(),
            self.acl.grantor.as_str(),
            self.row.get(ATTRIBUTE_ACL),
        )
    }

    fn key(&self) -> Vec<String> {
        vec![
            self.row.get(COMPARE_NAME).to_string(),
            self.acl.role.clone(),
        ]
    }

    /// `(column) ON schema.relation` for a statement against `schema`.
    fn target_clause(&self, schema: &str) -> String {
        format!(
            "({}) ON {}.{}",
            quote_identifier(self.row.get(ATTRIBUTE_NAME)),
            quote_identifier(schema),
            quote_identifier(self.row.get(RELATIONSHIP_NAME))
        )
    }
}

/// [`Comparator`] over the column ACL rows of one database.
#[derive(Debug)]
pub struct GrantAttributeComparator {
    cursor: Cursor<GrantAttributeEntry>,
    context: DiffContext,
}

impl GrantAttributeComparator {
    /// Decodes and sorts `rows` by compare name, grantee, grantor and raw acl item.
    ///
    /// [`Comparator::compare`] only looks at compare name and grantee.
    pub fn new(rows: Vec<CatalogRow>, context: DiffContext) -> Self {
        let mut entries: Vec<GrantAttributeEntry> =
            rows.into_iter().map(GrantAttributeEntry::new).collect();
        entries.sort_by(|a, b| a.merge_order().cmp(&b.merge_order()));

        Self {
            cursor: Cursor::new(entries),
            context,
        }
    }

    fn current_sort_key(&self) -> Option<(&str, &str)> {
        self.cursor.current().map(GrantAttributeEntry::sort_key)
    }

    fn render(&self, permissions: &[char]) -> String {
        render_permissions(permissions, self.context.privilege_style)
    }
}

impl Comparator for GrantAttributeComparator {
    fn object_kind(&self) -> ObjectKind {
        ObjectKind::GrantAttribute
    }

    fn advance(&mut self) -> bool {
        self.cursor.advance()
    }

    fn compare(&self, other: &dyn Comparator) -> PgDiffResult<Ordering> {
        let peer = downcast_peer::<GrantAttributeComparator>(
            ObjectKind::GrantAttribute,
            "compare",
            other,
        )?;

        Ok(compare_cursor_keys(
            self.current_sort_key(),
            peer.current_sort_key(),
        ))
    }

    fn current_key(&self) -> Option<Vec<String>> {
        self.cursor.current().map(GrantAttributeEntry::key)
    }

    fn emit_add(&self, sink: &mut dyn StatementSink) -> PgDiffResult<()> {
        let Some(entry) = self.cursor.current() else {
            return Ok(());
        };

        if entry.acl.permissions.is_empty() {
            warn!(
                key = ?entry.key(),
                acl = entry.row.get(ATTRIBUTE_ACL),
                "attribute acl has no permissions, skipping grant"
            );
            return Ok(());
        }

        let schema = self
            .context
            .target_scope
            .name()
            .unwrap_or_else(|| entry.row.get(SCHEMA_NAME));

        sink.emit(Statement::new(
            format!(
                "GRANT {} {} TO {}",
                self.render(&entry.acl.permissions),
                entry.target_clause(schema),
                entry.acl.grantee_sql()
            ),
            MergeBranch::Add,
            entry.key(),
        ))
    }

    fn emit_drop(&self, sink: &mut dyn StatementSink) -> PgDiffResult<()> {
        let Some(entry) = self.cursor.current() else {
            return Ok(());
        };

        if entry.acl.permissions.is_empty() {
            warn!(
                key = ?entry.key(),
                acl = entry.row.get(ATTRIBUTE_ACL),
                "attribute acl has no permissions, skipping revoke"
            );
            return Ok(());
        }

        sink.emit(Statement::new(
            format!(
                "REVOKE {} {} FROM {}",
                self.render(&entry.acl.permissions),
                entry.target_clause(entry.row.get(SCHEMA_NAME)),
                entry.acl.grantee_sql()
            ),
            MergeBranch::Drop,
            entry.key(),
        ))
    }

    fn emit_change(
        &self,
        other: &dyn Comparator,
        sink: &mut dyn StatementSink,
    ) -> PgDiffResult<()> {
        let peer = downcast_peer::<GrantAttributeComparator>(
            ObjectKind::GrantAttribute,
            "change",
            other,
        )?;

        let (Some(entry), Some(peer_entry)) = (self.cursor.current(), peer.cursor.current())
        else {
            return Ok(());
        };

        let target_clause = entry.target_clause(peer_entry.row.get(SCHEMA_NAME));
        let grantee = entry.acl.grantee_sql();

        let grants = entry.acl.permissions_missing_from(&peer_entry.acl);
        if !grants.is_empty() {
            sink.emit(Statement::new(
                format!("GRANT {} {target_clause} TO {grantee}", self.render(&grants)),
                MergeBranch::Change,
                entry.key(),
            ))?;
        }

        let revokes = peer_entry.acl.permissions_missing_from(&entry.acl);
        if !revokes.is_empty() {
            sink.emit(Statement::new(
                format!(
                    "REVOKE {} {target_clause} FROM {grantee}",
                    self.render(&revokes)
                ),
                MergeBranch::Change,
                entry.key(),
            ))?;
        }

        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use pgdiff_config::shared::PrivilegeStyle;

    use super::*;
    use crate::diff::engine::DiffEngine;
    use crate::diff::output::OutputLine;

    fn row(schema: &str, relation: &str, attribute: &str, acl: &str) -> CatalogRow {
        [
            (SCHEMA_NAME, schema.to_string()),
            (COMPARE_NAME, format!("r.{relation}.{attribute}")),
            (RELATION_TYPE, "TABLE".to_string()),
            (RELATIONSHIP_NAME, relation.to_string()),
            (ATTRIBUTE_NAME, attribute.to_string()),
            (ATTRIBUTE_ACL, acl.to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn named_context(source: &str, target: &str) -> DiffContext {
        DiffContext {
            source_scope: SchemaScope::from(source),
            target_scope: SchemaScope::from(target),
            privilege_style: PrivilegeStyle::Code,
        }
    }

    fn diff(source: Vec<CatalogRow>, target: Vec<CatalogRow>, context: DiffContext) -> Vec<String> {
        let mut source = GrantAttributeComparator::new(source, context.clone());
        let mut target = GrantAttributeComparator::new(target, context);
        let mut lines: Vec<OutputLine> = Vec::new();

        DiffEngine::default()
            .run(&mut source, &mut target, &mut lines)
            .unwrap();

        lines.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn added_permission_is_granted() {
        let lines = diff(
            vec![row("public", "accounts", "email", "alice=rw/bob")],
            vec![row("public", "accounts", "email", "alice=r/bob")],
            named_context("public", "public"),
        );

        assert_eq!(
            lines,
            vec!["GRANT w (email) ON public.accounts TO alice; -- Change"]
        );
    }

    #[test]
    fn extra_permission_is_revoked() {
        let lines = diff(
            vec![row("public", "accounts", "email", "alice=r/bob")],
            vec![row("public", "accounts", "email", "alice=rw/bob")],
            named_context("public", "public"),
        );

        assert_eq!(
            lines,
            vec!["REVOKE w (email) ON public.accounts FROM alice; -- Change"]
        );
    }

    #[test]
    fn change_emits_grant_before_revoke() {
        let lines = diff(
            vec![row("public", "accounts", "email", "alice=ra/bob")],
            vec![row("public", "accounts", "email", "alice=rwd/bob")],
            named_context("public", "public"),
        );

        assert_eq!(
            lines,
            vec![
                "GRANT a (email) ON public.accounts TO alice; -- Change",
                "REVOKE w, d (email) ON public.accounts FROM alice; -- Change",
            ]
        );
    }

    #[test]
    fn identical_acls_produce_nothing() {
        let rows = vec![
            row("public", "accounts", "email", "alice=rw/bob"),
            row("public", "accounts", "email", "=r/bob"),
            row("public", "orders", "total", "carol=arwdx/bob"),
        ];

        assert!(diff(rows.clone(), rows, named_context("public", "public")).is_empty());
    }

    #[test]
    fn items_from_several_grantors_match_in_any_catalog_order() {
        let source = vec![
            row("public", "t", "c", "alice=r/bob"),
            row("public", "t", "c", "alice=w/carol"),
        ];
        let target = vec![
            row("public", "t", "c", "alice=w/carol"),
            row("public", "t", "c", "alice=r/bob"),
        ];

        assert!(diff(source, target, named_context("public", "public")).is_empty());
    }

    #[test]
    fn grantor_items_pair_up_before_comparing_codes() {
        let lines = diff(
            vec![
                row("public", "t", "c", "alice=w/carol"),
                row("public", "t", "c", "alice=ra/bob"),
            ],
            vec![
                row("public", "t", "c", "alice=w/carol"),
                row("public", "t", "c", "alice=r/bob"),
            ],
            named_context("public", "public"),
        );

        assert_eq!(lines, vec!["GRANT a (c) ON public.t TO alice; -- Change"]);
    }

    #[test]
    fn add_uses_target_schema_for_named_scopes() {
        let lines = diff(
            vec![row("public", "accounts", "email", "alice=r/bob")],
            vec![],
            named_context("public", "staging"),
        );

        assert_eq!(
            lines,
            vec!["GRANT r (email) ON staging.accounts TO alice; -- Add"]
        );
    }

    #[test]
    fn add_uses_row_schema_for_wildcard_scope() {
        let lines = diff(
            vec![row("billing", "accounts", "email", "alice=r/bob")],
            vec![],
            DiffContext::default(),
        );

        assert_eq!(
            lines,
            vec!["GRANT r (email) ON billing.accounts TO alice; -- Add"]
        );
    }

    #[test]
    fn drop_uses_own_schema_and_public_grantee() {
        let lines = diff(
            vec![],
            vec![row("staging", "accounts", "email", "=rw/bob")],
            named_context("public", "staging"),
        );

        assert_eq!(
            lines,
            vec!["REVOKE r, w (email) ON staging.accounts FROM PUBLIC; -- Drop"]
        );
    }

    #[test]
    fn roles_of_one_column_are_matched_individually() {
        let lines = diff(
            vec![
                row("public", "accounts", "email", "carol=r/bob"),
                row("public", "accounts", "email", "alice=r/bob"),
            ],
            vec![
                row("public", "accounts", "email", "alice=r/bob"),
                row("public", "accounts", "email", "dave=r/bob"),
            ],
            named_context("public", "public"),
        );

        assert_eq!(
            lines,
            vec![
                "GRANT r (email) ON public.accounts TO carol; -- Add",
                "REVOKE r (email) ON public.accounts FROM dave; -- Drop",
            ]
        );
    }

    #[test]
    fn malformed_acl_emits_nothing() {
        let lines = diff(
            vec![row("public", "accounts", "email", "garbage")],
            vec![row("public", "orders", "total", "garbage")],
            named_context("public", "public"),
        );

        assert!(lines.is_empty());
    }

    #[test]
    fn identifiers_are_quoted_when_needed() {
        let lines = diff(
            vec![row("public", "Order Items", "unit price", r#""Report User"=r/bob"#)],
            vec![],
            named_context("public", "Sales"),
        );

        assert_eq!(
            lines,
            vec![
                r#"GRANT r ("unit price") ON "Sales"."Order Items" TO "Report User"; -- Add"#
            ]
        );
    }

    #[test]
    fn keyword_style_renders_privilege_names() {
        let mut context = named_context("public", "public");
        context.privilege_style = PrivilegeStyle::Keyword;

        let lines = diff(
            vec![row("public", "accounts", "email", "alice=rwx/bob")],
            vec![],
            context,
        );

        assert_eq!(
            lines,
            vec!["GRANT SELECT, UPDATE, REFERENCES (email) ON public.accounts TO alice; -- Add"]
        );
    }

    #[test]
    fn rows_are_sorted_by_compare_name_then_role() {
        let mut comparator = GrantAttributeComparator::new(
            vec![
                row("public", "b", "x", "zed=r/bob"),
                row("public", "a", "x", "mia=r/bob"),
                row("public", "b", "x", "amy=r/bob"),
            ],
            DiffContext::default(),
        );

        let mut keys = Vec::new();
        while comparator.advance() {
            keys.push(comparator.current_key().unwrap());
        }

        assert_eq!(
            keys,
            vec![
                vec!["r.a.x".to_string(), "mia".to_string()],
                vec!["r.b.x".to_string(), "amy".to_string()],
                vec!["r.b.x".to_string(), "zed".to_string()],
            ]
        );
    }

    #[test]
    fn wildcard_query_qualifies_compare_name() {
        let query = catalog_query(&SchemaScope::All);

        assert!(query.params.is_empty());
        assert!(query.sql.contains("n.nspname::text || '.' || c.relkind::text"));
        assert!(query.sql.contains("AND n.nspname NOT LIKE 'pg_%'"));
        assert!(query.sql.contains("AND n.nspname <> 'information_schema'"));
    }

    #[test]
    fn named_query_binds_schema() {
        let query = catalog_query(&SchemaScope::from("it's"));

        assert_eq!(query.params, vec!["it's".to_string()]);
        assert!(query.sql.contains("AND n.nspname = $1"));
        assert!(!query.sql.contains("it's"));
        assert!(!query.sql.contains("n.nspname::text || '.'"));
    }
}
