//! Suggested result-type declarations.
//!
//! When a shape check fails, the observed columns already describe the type
//! the query wants; generating its source saves the round trip of writing it
//! by hand.

use sqlprove::ColumnFact;
use tokio_postgres::types::Type;

fn rust_type(ty: &Type) -> Option<&'static str> {
    if *ty == Type::INT4 {
        Some("i32")
    } else if *ty == Type::INT8 {
        Some("i64")
    } else if *ty == Type::NUMERIC {
        Some("rust_decimal::Decimal")
    } else if *ty == Type::UUID {
        Some("uuid::Uuid")
    } else if *ty == Type::TIMESTAMP {
        Some("chrono::NaiveDateTime")
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR {
        Some("String")
    } else if *ty == Type::BOOL {
        Some("bool")
    } else {
        None
    }
}

/// A `#[derive(RowShape)]` struct matching the observed columns.
pub fn suggested_declaration(facts: &[ColumnFact]) -> String {
    let mut source = String::from("#[derive(sqlprove::RowShape)]\nstruct QueryResultRow {\n");
    for fact in facts {
        let base = match rust_type(&fact.pg_type) {
            Some(ty) => ty.to_string(),
            None => format!("() /* unsupported: {} */", fact.pg_type),
        };
        let field_type = if fact.nullable {
            format!("Option<{base}>")
        } else {
            base
        };
        source.push_str(&format!("    {}: {},\n", fact.name, field_type));
    }
    source.push('}');
    source
}
