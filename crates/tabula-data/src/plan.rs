//! Index planning: key-priority chains -> nested lookup maps.
//!
//! The key chain of a table is its keyed columns sorted by ascending
//! priority, ties kept in declaration order. A chain of length `n` becomes a
//! map nested `n` levels deep whose terminal level holds one record per full
//! key tuple. The planner renders the generated index type and its
//! single-pass builder, and can also build the same structure dynamically
//! over imported rows so duplicate keys surface during generation.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tabula_core::{DuplicateKeyError, FieldKind, Row, Value};

use crate::naming::{Naming, comment_text};
use crate::schema::TableSchema;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("key column '{column}' of table '{table}' has type '{declared}', which cannot key an index")]
    UnsupportedKeyType {
        table: String,
        column: String,
        declared: String,
    },
}

// ===========================================================================
// Plans
// ===========================================================================

/// One link of a key chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    pub name: String,
    /// Position of the column within the table schema.
    pub column: usize,
    pub priority: u32,
    pub kind: FieldKind,
}

/// The index layout for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPlan {
    pub table: String,
    pub chain: Vec<KeyColumn>,
}

impl IndexPlan {
    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    /// The nested map type, e.g. `HashMap<i32, HashMap<String, Item>>`.
    pub fn map_type(&self, record_type: &str) -> String {
        self.chain
            .iter()
            .rev()
            .fold(record_type.to_string(), |inner, key| {
                format!("HashMap<{}, {inner}>", key.kind.rust_type())
            })
    }
}

/// Plan the index of `schema`. Returns `Ok(None)` when no column is keyed.
pub fn plan_index(schema: &TableSchema) -> Result<Option<IndexPlan>, PlanError> {
    let mut chain: Vec<KeyColumn> = schema
        .columns
        .iter()
        .enumerate()
        .filter_map(|(column, spec)| {
            spec.key_priority.map(|priority| KeyColumn {
                name: spec.name.clone(),
                column,
                priority,
                kind: spec.declared_type.kind(),
            })
        })
        .collect();
    if chain.is_empty() {
        return Ok(None);
    }
    // Stable: equal priorities stay in declaration order.
    chain.sort_by_key(|k| k.priority);

    if let Some(bad) = chain.iter().find(|k| !k.kind.is_hashable()) {
        return Err(PlanError::UnsupportedKeyType {
            table: schema.table_name.clone(),
            column: bad.name.clone(),
            declared: schema.columns[bad.column].declared_type.raw().to_string(),
        });
    }

    Ok(Some(IndexPlan {
        table: schema.table_name.clone(),
        chain,
    }))
}

// ===========================================================================
// Rendering
// ===========================================================================

/// Name of the generated index type for a table.
pub fn index_type_name(naming: &Naming, table: &str) -> String {
    format!("{}Index", naming.type_name(table))
}

/// Render the outcome of planning as generated code.
///
/// Tables without an index get a marker comment so the output stays stable
/// across passes.
pub fn render_index(
    naming: &Naming,
    schema: &TableSchema,
    plan: &Result<Option<IndexPlan>, PlanError>,
    container: &str,
) -> String {
    let table = comment_text(&schema.table_name);
    match plan {
        Ok(Some(plan)) => render_plan(naming, schema, plan, container),
        Ok(None) => format!("// Table `{table}` declares no key columns; no index is generated.\n"),
        Err(e) => format!(
            "// Table `{table}`: {}; no index is generated.\n",
            comment_text(&e.to_string())
        ),
    }
}

fn key_expr(naming: &Naming, key: &KeyColumn) -> String {
    let field = format!("record.{}", naming.field_name(&key.name));
    if key.kind == FieldKind::Text {
        format!("{field}.clone()")
    } else {
        field
    }
}

fn render_plan(naming: &Naming, schema: &TableSchema, plan: &IndexPlan, container: &str) -> String {
    let Some((last, outer)) = plan.chain.split_last() else {
        return String::new();
    };
    let record = naming.type_name(&schema.table_name);
    let index = index_type_name(naming, &schema.table_name);
    let table_field = naming.field_name(&schema.table_name);
    let map_type = plan.map_type(&record);
    let keyed_by = plan
        .chain
        .iter()
        .map(|k| format!("`{}`", comment_text(&k.name)))
        .collect::<Vec<_>>()
        .join(", then ");

    let mut out = String::new();
    emit_line!(
        out,
        "/// Lookup index for table `{}`, keyed by {keyed_by}.",
        comment_text(&schema.table_name)
    );
    emit_line!(out, "#[derive(Debug, Clone, Default)]");
    emit_line!(out, "pub struct {index}(pub {map_type});");
    emit_line!(out);
    emit_line!(out, "impl Deref for {index} {{");
    emit_line!(out, "    type Target = {map_type};");
    emit_line!(out);
    emit_line!(out, "    fn deref(&self) -> &Self::Target {{");
    emit_line!(out, "        &self.0");
    emit_line!(out, "    }}");
    emit_line!(out, "}}");
    emit_line!(out);
    emit_line!(out, "impl ConfigIndex<{container}> for {index} {{");
    emit_line!(
        out,
        "    fn build(tables: &{container}) -> Result<Self, DuplicateKeyError> {{"
    );
    emit_line!(out, "        let mut map: {map_type} = HashMap::new();");
    emit_line!(out, "        for record in &tables.{table_field} {{");

    let target = if outer.is_empty() {
        "&mut map".to_string()
    } else {
        let mut level = String::from("map");
        for key in outer {
            level.push_str(&format!(".entry({}).or_default()", key_expr(naming, key)));
        }
        emit_line!(out, "            let level = {level};");
        "level".to_string()
    };
    let key_path = plan
        .chain
        .iter()
        .map(|k| format!("record.{}.to_string()", naming.field_name(&k.name)))
        .collect::<Vec<_>>()
        .join(", ");
    emit_line!(
        out,
        "            insert_terminal({target}, {}, record, {:?}, || vec![{key_path}])?;",
        key_expr(naming, last),
        schema.table_name
    );
    emit_line!(out, "        }}");
    emit_line!(out, "        Ok(Self(map))");
    emit_line!(out, "    }}");
    emit_line!(out, "}}");
    out
}

// ===========================================================================
// Dynamic construction
// ===========================================================================

/// A key value as seen by a dynamic index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl KeyValue {
    fn from_value(value: Option<&Value>, kind: FieldKind) -> KeyValue {
        match (value, kind) {
            (Some(Value::Int(v)), _) => KeyValue::Int(i64::from(*v)),
            (Some(Value::Long(v)), _) => KeyValue::Int(*v),
            (Some(Value::Bool(v)), _) => KeyValue::Bool(*v),
            (Some(Value::Text(v)), _) => KeyValue::Text(v.clone()),
            (_, FieldKind::Bool) => KeyValue::Bool(false),
            (_, FieldKind::Text) => KeyValue::Text(String::new()),
            _ => KeyValue::Int(0),
        }
    }
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{v}"),
            KeyValue::Bool(v) => write!(f, "{v}"),
            KeyValue::Text(v) => f.write_str(v),
        }
    }
}

/// One level of a dynamically built index. Leaves hold row positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexNode {
    Branch(BTreeMap<KeyValue, IndexNode>),
    Leaf(BTreeMap<KeyValue, usize>),
}

impl IndexNode {
    fn empty(depth: usize) -> Self {
        if depth <= 1 {
            IndexNode::Leaf(BTreeMap::new())
        } else {
            IndexNode::Branch(BTreeMap::new())
        }
    }

    /// Number of map levels, including the terminal one.
    pub fn depth(&self) -> usize {
        match self {
            IndexNode::Leaf(_) => 1,
            IndexNode::Branch(children) => {
                1 + children.values().next().map_or(1, IndexNode::depth)
            }
        }
    }

    /// Row position stored under a full key tuple.
    pub fn lookup(&self, keys: &[KeyValue]) -> Option<usize> {
        let (first, rest) = keys.split_first()?;
        match self {
            IndexNode::Leaf(rows) if rest.is_empty() => rows.get(first).copied(),
            IndexNode::Branch(children) => children.get(first)?.lookup(rest),
            IndexNode::Leaf(_) => None,
        }
    }

    /// Number of rows reachable from this node.
    pub fn len(&self) -> usize {
        match self {
            IndexNode::Leaf(rows) => rows.len(),
            IndexNode::Branch(children) => children.values().map(IndexNode::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `row` under `keys`; on collision returns the row already there.
    fn insert(&mut self, keys: &[KeyValue], row: usize) -> Result<(), usize> {
        let Some((first, rest)) = keys.split_first() else {
            return Ok(());
        };
        match self {
            IndexNode::Leaf(rows) => match rows.entry(first.clone()) {
                Entry::Occupied(existing) => Err(*existing.get()),
                Entry::Vacant(slot) => {
                    slot.insert(row);
                    Ok(())
                }
            },
            IndexNode::Branch(children) => children
                .entry(first.clone())
                .or_insert_with(|| IndexNode::empty(rest.len()))
                .insert(rest, row),
        }
    }
}

/// Build the index described by `plan` over imported rows in one pass.
pub fn build_index(plan: &IndexPlan, rows: &[Row]) -> Result<IndexNode, DuplicateKeyError> {
    let mut root = IndexNode::empty(plan.depth());
    for (position, row) in rows.iter().enumerate() {
        let keys: Vec<KeyValue> = plan
            .chain
            .iter()
            .map(|k| KeyValue::from_value(row.get(k.column), k.kind))
            .collect();
        if let Err(existing) = root.insert(&keys, position) {
            return Err(DuplicateKeyError {
                table: plan.table.clone(),
                key: keys.iter().map(ToString::to_string).collect(),
                first: format!("{:?}", rows[existing]),
                second: format!("{row:?}"),
            });
        }
    }
    Ok(root)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::read_schema;
    use crate::source::{Sheet, SourceLocator};

    fn schema(names: &[&str], priorities: &[&str], types: &[&str]) -> TableSchema {
        let sheet = Sheet::from_rows("Reward", &[names, priorities, types]);
        read_schema(&sheet, SourceLocator::new("design.xlsx", "Reward")).unwrap()
    }

    fn chain_names(plan: &IndexPlan) -> Vec<&str> {
        plan.chain.iter().map(|k| k.name.as_str()).collect()
    }

    // -----------------------------------------------------------------------
    // Planning
    // -----------------------------------------------------------------------

    #[test]
    fn no_keys_no_plan() {
        let s = schema(&["a", "b"], &["", "0"], &["int", "int"]);
        assert_eq!(plan_index(&s), Ok(None));
    }

    #[test]
    fn chain_sorted_by_priority() {
        let s = schema(&["a", "b", "c"], &["3", "", "1"], &["int", "int", "string"]);
        let plan = plan_index(&s).unwrap().unwrap();
        assert_eq!(chain_names(&plan), vec!["c", "a"]);
        assert_eq!(plan.depth(), 2);
        assert_eq!(plan.chain[0].column, 2);
    }

    #[test]
    fn equal_priorities_keep_declaration_order() {
        let s = schema(&["b", "a", "c"], &["1", "1", "1"], &["int", "int", "int"]);
        let plan = plan_index(&s).unwrap().unwrap();
        assert_eq!(chain_names(&plan), vec!["b", "a", "c"]);
    }

    #[test]
    fn float_key_is_rejected() {
        let s = schema(&["rate"], &["1"], &["float"]);
        assert!(matches!(
            plan_index(&s),
            Err(PlanError::UnsupportedKeyType { ref column, ref declared, .. })
                if column == "rate" && declared == "float"
        ));
    }

    #[test]
    fn map_type_nests_per_level() {
        let s = schema(&["a"], &["1"], &["int"]);
        let one = plan_index(&s).unwrap().unwrap();
        assert_eq!(one.map_type("Reward"), "HashMap<i32, Reward>");

        let s = schema(&["a", "b", "c"], &["1", "2", "3"], &["long", "string", "bool"]);
        let three = plan_index(&s).unwrap().unwrap();
        assert_eq!(
            three.map_type("Reward"),
            "HashMap<i64, HashMap<String, HashMap<bool, Reward>>>"
        );
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    #[test]
    fn renders_flat_index() {
        let s = schema(&["id", "name"], &["1", ""], &["int", "string"]);
        let plan = plan_index(&s);
        let code = render_index(&Naming::default(), &s, &plan, "ConfigTables");
        assert!(code.contains("pub struct RewardIndex(pub HashMap<i32, Reward>);"));
        assert!(code.contains("impl ConfigIndex<ConfigTables> for RewardIndex {"));
        assert!(code.contains("for record in &tables.reward {"));
        assert!(code.contains(
            "insert_terminal(&mut map, record.id, record, \"Reward\", || vec![record.id.to_string()])?;"
        ));
    }

    #[test]
    fn renders_nested_index() {
        let s = schema(&["monster", "stage"], &["1", "2"], &["string", "int"]);
        let plan = plan_index(&s);
        let code = render_index(&Naming::default(), &s, &plan, "ConfigTables");
        assert!(code.contains("pub struct RewardIndex(pub HashMap<String, HashMap<i32, Reward>>);"));
        assert!(code.contains("let level = map.entry(record.monster.clone()).or_default();"));
        assert!(code.contains("insert_terminal(level, record.stage, record,"));
        assert!(code.contains("keyed by `monster`, then `stage`"));
    }

    #[test]
    fn renders_markers_without_index() {
        let naming = Naming::default();
        let s = schema(&["a"], &[""], &["int"]);
        let code = render_index(&naming, &s, &plan_index(&s), "ConfigTables");
        assert_eq!(code, "// Table `Reward` declares no key columns; no index is generated.\n");

        let s = schema(&["rate"], &["1"], &["double"]);
        let code = render_index(&naming, &s, &plan_index(&s), "ConfigTables");
        assert!(code.starts_with("// Table `Reward`: key column 'rate'"));
    }

    // -----------------------------------------------------------------------
    // Dynamic construction
    // -----------------------------------------------------------------------

    fn row(a: i32, b: &str) -> Row {
        Row::new(vec![Value::Int(a), Value::Text(b.to_string())])
    }

    #[test]
    fn dynamic_index_depth_matches_chain() {
        let s = schema(&["a", "b"], &["1", "2"], &["int", "string"]);
        let plan = plan_index(&s).unwrap().unwrap();
        let rows = vec![row(1, "x"), row(1, "y"), row(2, "x")];
        let index = build_index(&plan, &rows).unwrap();

        assert_eq!(index.depth(), 2);
        assert_eq!(index.len(), 3);
        for (i, r) in rows.iter().enumerate() {
            let keys = [KeyValue::Int(i64::from(r.int(0))), KeyValue::Text(r.text(1))];
            assert_eq!(index.lookup(&keys), Some(i));
        }
        assert_eq!(index.lookup(&[KeyValue::Int(1)]), None);
    }

    #[test]
    fn dynamic_flat_index() {
        let s = schema(&["a", "b"], &["1", ""], &["int", "string"]);
        let plan = plan_index(&s).unwrap().unwrap();
        let index = build_index(&plan, &[row(1001, "Potion"), row(1002, "Ether")]).unwrap();
        assert_eq!(index.depth(), 1);
        assert_eq!(index.lookup(&[KeyValue::Int(1002)]), Some(1));
    }

    #[test]
    fn dynamic_duplicate_reports_both_rows() {
        let s = schema(&["a", "b"], &["1", ""], &["int", "string"]);
        let plan = plan_index(&s).unwrap().unwrap();
        let err = build_index(&plan, &[row(1001, "Potion"), row(1001, "Elixir")]).unwrap_err();
        assert_eq!(err.table, "Reward");
        assert_eq!(err.key, vec!["1001"]);
        assert!(err.first.contains("Potion"));
        assert!(err.second.contains("Elixir"));
    }

    #[test]
    fn empty_table_builds_empty_index() {
        let s = schema(&["a"], &["1"], &["int"]);
        let plan = plan_index(&s).unwrap().unwrap();
        let index = build_index(&plan, &[]).unwrap();
        assert!(index.is_empty());
    }
}
