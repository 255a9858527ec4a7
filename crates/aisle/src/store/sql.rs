//! SQL text for the PostgreSQL store.
//!
//! Identifiers are always quoted: namespaces such as `elCorteIngles` are
//! mixed-case and would otherwise be folded to lower case.

use std::fmt::Write;

use crate::schema::TableDefinition;

/// PostgreSQL's limit on bind parameters in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Catalog lookup: `$1` = namespace, `$2` = table.
pub const TABLE_EXISTS: &str = "SELECT EXISTS (\
     SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1 AND table_name = $2)";

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"namespace"."table"`
pub fn qualified_table(definition: &TableDefinition) -> String {
    format!(
        "{}.{}",
        quote_ident(definition.namespace()),
        quote_ident(definition.table())
    )
}

pub fn create_schema(namespace: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(namespace))
}

/// `CREATE TABLE` with every column, its nullability and the primary key.
///
/// Deliberately without `IF NOT EXISTS`: a concurrent creator must surface
/// as a duplicate-table error so the caller can tell the cases apart.
pub fn create_table(definition: &TableDefinition) -> String {
    let mut columns: Vec<String> = definition
        .columns()
        .iter()
        .map(|column| {
            let mut text = format!(
                "{} {}",
                quote_ident(&column.name),
                column.column_type.sql_name()
            );
            if !column.is_nullable() {
                text.push_str(" NOT NULL");
            }
            text
        })
        .collect();
    columns.push(format!(
        "PRIMARY KEY ({})",
        quote_ident(&definition.primary_key().name)
    ));

    format!(
        "CREATE TABLE {} ({})",
        qualified_table(definition),
        columns.join(", ")
    )
}

/// Multi-row insert with positional parameters for `rows` rows.
pub fn insert(definition: &TableDefinition, rows: usize) -> String {
    let column_count = definition.columns().len();
    let column_list = definition
        .columns()
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ",
        qualified_table(definition),
        column_list
    );
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for col in 0..column_count {
            if col > 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "${}", row * column_count + col + 1);
        }
        sql.push(')');
    }
    sql
}

/// Rows per insert statement so that one statement stays under the
/// bind-parameter limit.
pub fn max_rows_per_statement(column_count: usize) -> usize {
    (MAX_BIND_PARAMS / column_count.max(1)).max(1)
}
