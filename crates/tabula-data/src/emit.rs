//! Rust code generation for record, index and container types.
//!
//! One generation pass emits a single module: a record struct and `FromRow`
//! converter per table, the index types planned for keyed tables, and the
//! container struct whose `ConfigContainer` impl is the compile-time table
//! registry. The output depends only on the schemas and emitter options, so
//! re-running on unchanged schemas yields byte-identical text.

use std::collections::HashSet;
use std::path::Path;

use crate::diag::{Diagnostic, DiagnosticSink};
use crate::naming::{Naming, comment_text};
use crate::plan::{self, IndexPlan, PlanError};
use crate::schema::{SchemaError, TableSchema};

/// Type names the generated module already refers to.
const RESERVED_TYPES: &[&str] = &[
    "Box",
    "ConfigContainer",
    "ConfigIndex",
    "Deref",
    "Deserialize",
    "DuplicateKeyError",
    "FromRow",
    "HashMap",
    "IndexRegistry",
    "Option",
    "Result",
    "Row",
    "RowSet",
    "Serialize",
    "String",
    "Vec",
];

/// Whether `name` can be used verbatim as the generated container type.
pub fn is_container_name(name: &str) -> bool {
    Naming::new("").type_name(name) == name && !RESERVED_TYPES.contains(&name)
}

// ===========================================================================
// Options
// ===========================================================================

/// Settings that shape the generated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    pub naming: Naming,
    /// Name of the generated container struct.
    pub container: String,
    /// Path the generated code uses to reach the runtime crate.
    pub runtime_crate: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            naming: Naming::default(),
            container: "ConfigTables".to_string(),
            runtime_crate: "tabula_core".to_string(),
        }
    }
}

// ===========================================================================
// Output
// ===========================================================================

/// Outcome of planning one table's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePlan {
    pub table: String,
    pub plan: Result<Option<IndexPlan>, PlanError>,
}

/// The result of one generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedModule {
    /// Generated Rust source.
    pub source: String,
    /// Content hash identifying this pass.
    pub session_tag: String,
    /// Schemas that made it into the module, in emission order.
    pub tables: Vec<TableSchema>,
    pub plans: Vec<TablePlan>,
}

impl EmittedModule {
    /// Names of the generated index types.
    pub fn index_types(&self, naming: &Naming) -> Vec<String> {
        self.plans
            .iter()
            .filter(|p| matches!(p.plan, Ok(Some(_))))
            .map(|p| plan::index_type_name(naming, &p.table))
            .collect()
    }

    /// Write the source to `path` unless it already holds the same bytes.
    /// Returns whether the file changed.
    pub fn write_to(&self, path: &Path) -> std::io::Result<bool> {
        if std::fs::read_to_string(path).is_ok_and(|existing| existing == self.source) {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.source)?;
        Ok(true)
    }
}

// ===========================================================================
// Emitter
// ===========================================================================

/// Turns table schemas into a generated Rust module.
#[derive(Debug, Clone, Default)]
pub struct TypeModelEmitter {
    options: EmitOptions,
}

impl TypeModelEmitter {
    pub fn new(options: EmitOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// Content hash of everything that influences the generated code.
    pub fn session_tag(&self, schemas: &[TableSchema]) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.options.container.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.options.runtime_crate.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.options.naming.separator().as_bytes());
        for schema in schemas {
            hasher.update(&[1]);
            hasher.update(schema.table_name.as_bytes());
            for column in &schema.columns {
                hasher.update(&[2]);
                hasher.update(column.name.as_bytes());
                hasher.update(&[0]);
                hasher.update(column.declared_type.raw().as_bytes());
                hasher.update(&column.key_priority.unwrap_or(0).to_le_bytes());
            }
        }
        hasher.finalize().to_hex().as_str()[..16].to_string()
    }

    /// Drop tables whose generated identifiers would collide.
    fn accept(&self, schemas: Vec<TableSchema>, sink: &dyn DiagnosticSink) -> Vec<TableSchema> {
        let naming = &self.options.naming;
        let mut taken: HashSet<String> = RESERVED_TYPES.iter().map(|s| s.to_string()).collect();
        taken.insert(self.options.container.clone());
        let mut fields = HashSet::new();
        let mut accepted = Vec::with_capacity(schemas.len());

        for schema in schemas {
            let type_name = naming.type_name(&schema.table_name);
            let index_name = plan::index_type_name(naming, &schema.table_name);
            let field = naming.field_name(&schema.table_name);

            let mut collision = [&type_name, &index_name]
                .into_iter()
                .find(|ident| taken.contains(*ident))
                .cloned();
            if collision.is_none() && fields.contains(&field) {
                collision = Some(field.clone());
            }
            if collision.is_none() {
                let mut columns = HashSet::new();
                collision = schema
                    .columns
                    .iter()
                    .map(|c| naming.field_name(&c.name))
                    .find(|f| !columns.insert(f.clone()));
            }

            if let Some(ident) = collision {
                sink.report(Diagnostic::TableSkipped {
                    locator: schema.source.to_string(),
                    error: SchemaError::NameCollision {
                        table: schema.table_name.clone(),
                        ident,
                    },
                });
                continue;
            }
            taken.insert(type_name);
            taken.insert(index_name);
            fields.insert(field);
            accepted.push(schema);
        }
        accepted
    }

    /// Run one generation pass over `schemas`.
    pub fn emit(&self, schemas: Vec<TableSchema>, sink: &dyn DiagnosticSink) -> EmittedModule {
        let tables = self.accept(schemas, sink);
        let session_tag = self.session_tag(&tables);
        let plans: Vec<TablePlan> = tables
            .iter()
            .map(|schema| {
                let plan = plan::plan_index(schema);
                if let Err(e) = &plan {
                    sink.report(Diagnostic::IndexSkipped {
                        table: schema.table_name.clone(),
                        reason: e.to_string(),
                    });
                }
                TablePlan {
                    table: schema.table_name.clone(),
                    plan,
                }
            })
            .collect();

        let source = self.render(&tables, &plans, &session_tag);
        tracing::debug!(
            tables = tables.len(),
            session = %session_tag,
            bytes = source.len(),
            "emitted config module"
        );
        EmittedModule {
            source,
            session_tag,
            tables,
            plans,
        }
    }

    fn render(&self, tables: &[TableSchema], plans: &[TablePlan], session_tag: &str) -> String {
        let EmitOptions {
            naming,
            container,
            runtime_crate: rt,
        } = &self.options;
        let has_index = plans.iter().any(|p| matches!(p.plan, Ok(Some(_))));

        let mut out = String::new();
        emit_line!(out, "// @generated by tabula. Do not edit by hand.");
        emit_line!(out, "// session: {session_tag}");
        emit_line!(out, "#![allow(non_snake_case)]");
        emit_line!(out);
        if has_index {
            emit_line!(out, "use std::collections::HashMap;");
            emit_line!(out, "use std::ops::Deref;");
            emit_line!(out);
        }
        emit_line!(out, "use serde::{{Deserialize, Serialize}};");
        if has_index {
            emit_line!(out, "use {rt}::index::insert_terminal;");
            emit_line!(out, "use {rt}::{{ConfigIndex, DuplicateKeyError}};");
        }
        emit_line!(out, "use {rt}::{{ConfigContainer, FromRow, IndexRegistry, Row, RowSet}};");

        for (schema, table_plan) in tables.iter().zip(plans) {
            emit_line!(out);
            out.push_str(&self.render_record(schema));
            emit_line!(out);
            out.push_str(&plan::render_index(naming, schema, &table_plan.plan, container));
        }

        emit_line!(out);
        emit_line!(out, "/// Every configuration table, as stored in the snapshot.");
        emit_line!(out, "#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]");
        emit_line!(out, "pub struct {container} {{");
        for schema in tables {
            emit_line!(
                out,
                "    pub {}: Vec<{}>,",
                naming.field_name(&schema.table_name),
                naming.type_name(&schema.table_name)
            );
        }
        emit_line!(out, "}}");
        emit_line!(out);

        let table_list = tables
            .iter()
            .map(|s| format!("{:?}", s.table_name))
            .collect::<Vec<_>>()
            .join(", ");
        let rows_arg = if tables.is_empty() { "_rows" } else { "rows" };
        let registry_arg = if has_index { "registry" } else { "_registry" };

        emit_line!(out, "impl ConfigContainer for {container} {{");
        emit_line!(out, "    const SESSION_TAG: &'static str = {session_tag:?};");
        emit_line!(out, "    const TABLES: &'static [&'static str] = &[{table_list}];");
        emit_line!(out);
        emit_line!(out, "    fn from_rows({rows_arg}: &RowSet) -> Self {{");
        emit_line!(out, "        Self {{");
        for schema in tables {
            emit_line!(
                out,
                "            {}: rows.convert({:?}),",
                naming.field_name(&schema.table_name),
                schema.table_name
            );
        }
        emit_line!(out, "        }}");
        emit_line!(out, "    }}");
        emit_line!(out);
        emit_line!(out, "    fn register_indices({registry_arg}: &mut IndexRegistry<Self>) {{");
        for table_plan in plans.iter().filter(|p| matches!(p.plan, Ok(Some(_)))) {
            emit_line!(
                out,
                "        registry.register::<{}>();",
                plan::index_type_name(naming, &table_plan.table)
            );
        }
        emit_line!(out, "    }}");
        emit_line!(out, "}}");
        out
    }

    fn render_record(&self, schema: &TableSchema) -> String {
        let naming = &self.options.naming;
        let record = naming.type_name(&schema.table_name);

        let mut out = String::new();
        emit_line!(out, "/// Record of table `{}`.", comment_text(&schema.table_name));
        emit_line!(out, "#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]");
        emit_line!(out, "pub struct {record} {{");
        for column in &schema.columns {
            if !column.declared_type.is_recognized() {
                emit_line!(
                    out,
                    "    /// Declared as `{}`.",
                    comment_text(column.declared_type.raw())
                );
            }
            emit_line!(
                out,
                "    pub {}: {},",
                naming.field_name(&column.name),
                column.declared_type.kind().rust_type()
            );
        }
        emit_line!(out, "}}");
        emit_line!(out);
        emit_line!(out, "impl FromRow for {record} {{");
        emit_line!(out, "    fn from_row(row: &Row) -> Self {{");
        emit_line!(out, "        Self {{");
        for (i, column) in schema.columns.iter().enumerate() {
            emit_line!(
                out,
                "            {}: row.{}({i}),",
                naming.field_name(&column.name),
                column.declared_type.kind().row_accessor()
            );
        }
        emit_line!(out, "        }}");
        emit_line!(out, "    }}");
        emit_line!(out, "}}");
        out
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::CollectingSink;
    use crate::schema::read_schema;
    use crate::source::{Sheet, SourceLocator};

    fn schema(name: &str, rows: &[&[&str]]) -> TableSchema {
        read_schema(
            &Sheet::from_rows(name, rows),
            SourceLocator::new("design.xlsx", name),
        )
        .unwrap()
    }

    fn item() -> TableSchema {
        schema(
            "Item",
            &[
                &["id", "name", "price", "tags"],
                &["1"],
                &["int", "string", "float", "List<int>"],
            ],
        )
    }

    fn monster_drop() -> TableSchema {
        schema(
            "monster_drop",
            &[
                &["monster", "stage", "item_id", "rate", "rare", "curve"],
                &["1", "2"],
                &["int", "int", "long", "double", "bool", "AnimationCurve"],
            ],
        )
    }

    fn note() -> TableSchema {
        schema("Note", &[&["text"], &[], &["string"]])
    }

    fn emit(schemas: Vec<TableSchema>) -> (EmittedModule, CollectingSink) {
        let sink = CollectingSink::new();
        let module = TypeModelEmitter::default().emit(schemas, &sink);
        (module, sink)
    }

    fn struct_fields<'a>(source: &'a str, name: &str) -> Vec<&'a str> {
        let header = format!("pub struct {name} {{");
        source
            .lines()
            .skip_while(|l| *l != header)
            .skip(1)
            .take_while(|l| *l != "}")
            .filter(|l| l.trim_start().starts_with("pub "))
            .map(str::trim)
            .collect()
    }

    #[test]
    fn record_has_one_field_per_column_in_order() {
        let (module, _) = emit(vec![item()]);
        assert_eq!(
            struct_fields(&module.source, "Item"),
            vec![
                "pub id: i32,",
                "pub name: String,",
                "pub price: f32,",
                "pub tags: Vec<i32>,"
            ]
        );
    }

    #[test]
    fn converters_read_by_column_position() {
        let (module, _) = emit(vec![monster_drop()]);
        let src = &module.source;
        assert!(src.contains("pub struct MonsterDrop {"));
        assert!(src.contains("            itemId: row.long(2),"));
        assert!(src.contains("            rate: row.double(3),"));
        assert!(src.contains("            rare: row.bool(4),"));
        assert!(src.contains("            curve: row.text(5),"));
        assert!(src.contains("    /// Declared as `AnimationCurve`."));
    }

    #[test]
    fn container_holds_one_vec_per_table() {
        let (module, _) = emit(vec![item(), monster_drop(), note()]);
        assert_eq!(
            struct_fields(&module.source, "ConfigTables"),
            vec![
                "pub item: Vec<Item>,",
                "pub monsterDrop: Vec<MonsterDrop>,",
                "pub note: Vec<Note>,"
            ]
        );
        assert!(module.source.contains(
            "const TABLES: &'static [&'static str] = &[\"Item\", \"monster_drop\", \"Note\"];"
        ));
        assert!(module.source.contains("            monsterDrop: rows.convert(\"monster_drop\"),"));
    }

    #[test]
    fn indices_follow_key_chains() {
        let (module, _) = emit(vec![item(), monster_drop(), note()]);
        let src = &module.source;
        assert!(src.contains("pub struct ItemIndex(pub HashMap<i32, Item>);"));
        assert!(src.contains(
            "pub struct MonsterDropIndex(pub HashMap<i32, HashMap<i32, MonsterDrop>>);"
        ));
        assert!(!src.contains("NoteIndex"));
        assert!(src.contains("// Table `Note` declares no key columns; no index is generated."));
        assert!(src.contains("        registry.register::<ItemIndex>();"));
        assert!(src.contains("        registry.register::<MonsterDropIndex>();"));
        assert_eq!(
            module.index_types(&Naming::default()),
            vec!["ItemIndex", "MonsterDropIndex"]
        );
    }

    #[test]
    fn unkeyed_module_skips_index_imports() {
        let (module, _) = emit(vec![note()]);
        assert!(!module.source.contains("use std::collections::HashMap;"));
        assert!(!module.source.contains("insert_terminal"));
        assert!(module.source.contains("fn register_indices(_registry: &mut IndexRegistry<Self>) {"));
    }

    #[test]
    fn empty_schema_set_still_emits_a_container() {
        let (module, _) = emit(Vec::new());
        assert!(module.source.contains("pub struct ConfigTables {\n}"));
        assert!(module.source.contains("fn from_rows(_rows: &RowSet) -> Self {"));
        assert!(module.source.contains("const TABLES: &'static [&'static str] = &[];"));
    }

    #[test]
    fn emission_is_idempotent() {
        let (a, _) = emit(vec![item(), monster_drop(), note()]);
        let (b, _) = emit(vec![item(), monster_drop(), note()]);
        assert_eq!(a.source, b.source);
        assert_eq!(a.session_tag, b.session_tag);
        assert!(a.source.contains(&format!("const SESSION_TAG: &'static str = \"{}\";", a.session_tag)));
    }

    #[test]
    fn session_tag_tracks_schema_changes() {
        let (a, _) = emit(vec![item()]);
        let mut changed = item();
        changed.columns[1].key_priority = Some(2);
        let (b, _) = emit(vec![changed]);
        assert_ne!(a.session_tag, b.session_tag);
        assert_eq!(a.session_tag.len(), 16);
    }

    #[test]
    fn session_tag_ignores_source_location() {
        let (a, _) = emit(vec![item()]);
        let mut moved = item();
        moved.source = SourceLocator::new("elsewhere/design.xlsx", "Item");
        let (b, _) = emit(vec![moved]);
        assert_eq!(a.session_tag, b.session_tag);
    }

    #[test]
    fn unsupported_key_is_reported_and_skipped() {
        let rated = schema("Rate", &[&["value"], &["1"], &["double"]]);
        let (module, sink) = emit(vec![rated]);
        assert!(!module.source.contains("RateIndex"));
        assert!(matches!(&sink.take()[0], Diagnostic::IndexSkipped { table, .. } if table == "Rate"));
    }

    #[test]
    fn colliding_tables_are_skipped() {
        let lower = schema("item", &[&["id"], &[], &["int"]]);
        let (module, sink) = emit(vec![item(), lower]);
        assert_eq!(module.tables.len(), 1);
        assert!(matches!(
            &sink.take()[0],
            Diagnostic::TableSkipped { error: SchemaError::NameCollision { ident, .. }, .. }
                if ident == "Item"
        ));
    }

    #[test]
    fn reserved_and_column_collisions_are_skipped() {
        let row = schema("Row", &[&["id"], &[], &["int"]]);
        let cols = schema("Stats", &[&["max_hp", "maxHp"], &[], &["int", "int"]]);
        let (module, sink) = emit(vec![row, cols]);
        assert!(module.tables.is_empty());
        assert_eq!(sink.take().len(), 2);
    }

    #[test]
    fn prelude_type_names_are_reserved() {
        let schemas = ["Result", "String", "Vec", "Option", "box"]
            .map(|name| schema(name, &[&["id", "name"], &["1"], &["int", "string"]]));
        let (module, sink) = emit(Vec::from(schemas));

        assert!(module.tables.is_empty());
        let diags = sink.take();
        assert_eq!(diags.len(), 5);
        assert!(diags.iter().all(|d| matches!(
            d,
            Diagnostic::TableSkipped { error: SchemaError::NameCollision { .. }, .. }
        )));
        assert!(!module.source.contains("pub struct Result"));
        assert!(!module.source.contains("pub struct Box"));
    }

    #[test]
    fn line_breaks_in_names_stay_inside_comments() {
        let hero = schema(
            "Hero",
            &[
                &["id", "max\nhp", "curve"],
                &["1", "2"],
                &["int", "int", "Anim\r\nCurve"],
            ],
        );
        let (module, _) = emit(vec![hero]);
        let src = &module.source;

        assert!(src.contains("/// Lookup index for table `Hero`, keyed by `id`, then `max hp`."));
        assert!(src.contains("    /// Declared as `Anim  Curve`."));
        assert!(src.contains("    pub max_hp: i32,"));
        assert!(src.contains("            max_hp: row.int(1),"));
        assert!(!src.lines().any(|l| l.starts_with("hp") || l.starts_with("Curve")));
    }

    #[test]
    fn non_identifier_characters_are_replaced() {
        let squared = schema("Area²", &[&["side²"], &[], &["int"]]);
        let (module, _) = emit(vec![squared]);
        assert!(module.source.contains("pub struct Area_ {"));
        assert!(module.source.contains("    pub side_: i32,"));
        assert!(module.source.contains("/// Record of table `Area²`."));
    }

    #[test]
    fn write_to_skips_unchanged_files() {
        let dir = tabula_core::test_utils::make_test_dir("emit_write");
        let path = dir.join("src").join("config_tables.rs");
        let (module, _) = emit(vec![item()]);

        assert!(module.write_to(&path).unwrap());
        assert!(!module.write_to(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), module.source);

        tabula_core::test_utils::cleanup(&dir);
    }
}
