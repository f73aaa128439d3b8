//! Built-in records a collection starts with before anything is persisted.

use std::time::SystemTime;

use serde_json::json;

use crate::schema::{INDICATIONS, SELLERS, USERS};
use crate::{iso8601, Record, Value};

/// Seed records for a collection; unknown collections start empty.
///
/// Indication seeds are stamped with `now` so they land in the current month.
pub fn seed_records(collection: &str, now: SystemTime) -> Vec<Record> {
    let values = match collection {
        USERS => users(),
        SELLERS => sellers(),
        INDICATIONS => indications(&iso8601(now)),
        _ => Vec::new(),
    };
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

fn users() -> Vec<Value> {
    vec![
        json!({"id": "mock-user-id", "email": "usuario@teste.com", "role": "user", "name": "Usuário Teste"}),
        json!({"id": "mock-admin-id", "email": "admin@sistema.com", "role": "admin", "name": "Admin Sistema"}),
    ]
}

fn sellers() -> Vec<Value> {
    vec![
        json!({"id": "vendedor-1", "name": "Carlos Vendas", "active": true}),
        json!({"id": "vendedor-2", "name": "Ana Comercial", "active": true}),
    ]
}

fn indications(created_at: &str) -> Vec<Value> {
    let rows = [
        ("1", "João Silva", "(11) 99999-9999", "Cliente interessado em seguro completo", "em_contato", "vendedor-1", "Carlos Vendas"),
        ("2", "Maria Santos", "(11) 88888-8888", "Interessada em plano familiar", "negociacao", "vendedor-2", "Ana Comercial"),
        ("3", "Pedro Costa", "(11) 77777-7777", "Cliente corporativo", "fechados", "vendedor-1", "Carlos Vendas"),
        ("4", "Ana Oliveira", "(11) 66666-6666", "Não teve interesse no momento", "nao_interessado", "vendedor-2", "Ana Comercial"),
    ];
    rows.into_iter()
        .map(|(id, name, phone, observation, status, seller_id, seller_name)| {
            json!({
                "id": id,
                "indicated_name": name,
                "indicated_phone": phone,
                "observation": observation,
                "status": status,
                "seller_id": seller_id,
                "seller_name": seller_name,
                "user_id": "mock-user-id",
                "user_name": "Usuário Teste",
                "created_at": created_at,
            })
        })
        .collect()
}
