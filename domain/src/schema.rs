//! Typed rows for the referral tracker's collections.
//!
//! Records travel through the backend as open JSON maps; these types are the
//! schema each collection is checked against when records are turned into
//! values callers work with.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::validate::{validate_indicated_name, validate_indicated_phone};
use crate::{CoreError, Record, Value};

pub const USERS: &str = "users";
pub const SELLERS: &str = "sellers";
pub const INDICATIONS: &str = "indications";

/// A typed row bound to one collection.
pub trait Row: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;

    /// Decode a stored record, rejecting records that don't fit the schema.
    fn from_record(record: Record) -> Result<Self, CoreError> {
        serde_json::from_value(Value::Object(record))
            .map_err(|e| CoreError::InvalidRecord(format!("{}: {e}", Self::COLLECTION)))
    }

    fn to_record(&self) -> Result<Record, CoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CoreError::InvalidRecord(format!("{}: not an object", Self::COLLECTION))),
            Err(e) => Err(CoreError::InvalidRecord(format!("{}: {e}", Self::COLLECTION))),
        }
    }
}

/// Access level of an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Row for User {
    const COLLECTION: &'static str = USERS;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    pub name: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Row for Seller {
    const COLLECTION: &'static str = SELLERS;
}

/// Pipeline stage of an indication, in board order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicationStatus {
    EmContato,
    Negociacao,
    Fechamento,
    Fechados,
    NaoInteressado,
}

impl IndicationStatus {
    pub const ALL: [IndicationStatus; 5] = [
        IndicationStatus::EmContato,
        IndicationStatus::Negociacao,
        IndicationStatus::Fechamento,
        IndicationStatus::Fechados,
        IndicationStatus::NaoInteressado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicationStatus::EmContato => "em_contato",
            IndicationStatus::Negociacao => "negociacao",
            IndicationStatus::Fechamento => "fechamento",
            IndicationStatus::Fechados => "fechados",
            IndicationStatus::NaoInteressado => "nao_interessado",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|st| st.as_str() == needle)
    }

    /// Column heading on the kanban board.
    pub fn title(&self) -> &'static str {
        match self {
            IndicationStatus::EmContato => "Em Contato",
            IndicationStatus::Negociacao => "Negociação",
            IndicationStatus::Fechamento => "Fechamento",
            IndicationStatus::Fechados => "Fechados",
            IndicationStatus::NaoInteressado => "Não Interessados",
        }
    }

    /// Closed or lost; no further work expected.
    pub fn is_settled(&self) -> bool {
        matches!(self, IndicationStatus::Fechados | IndicationStatus::NaoInteressado)
    }
}

impl From<IndicationStatus> for Value {
    fn from(status: IndicationStatus) -> Self {
        Value::from(status.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indication {
    pub id: String,
    pub indicated_name: String,
    pub indicated_phone: String,
    #[serde(default)]
    pub observation: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub seller_id: String,
    pub seller_name: String,
    pub status: IndicationStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Row for Indication {
    const COLLECTION: &'static str = INDICATIONS;
}

/// Input for a new indication as submitted by a referrer, before a seller is
/// assigned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewIndication {
    indicated_name: String,
    indicated_phone: String,
    observation: String,
}

impl NewIndication {
    pub fn new<N, P>(indicated_name: N, indicated_phone: P, observation: Option<String>) -> Result<Self, CoreError>
    where
        N: Into<String>,
        P: Into<String>,
    {
        let indicated_name = indicated_name.into().trim().to_string();
        let indicated_phone = indicated_phone.into().trim().to_string();
        validate_indicated_name(&indicated_name)?;
        validate_indicated_phone(&indicated_phone)?;
        Ok(Self {
            indicated_name,
            indicated_phone,
            observation: observation.unwrap_or_default(),
        })
    }

    /// Build the record to insert once the referrer and seller are known.
    /// `id` and `created_at` are left for the backend to assign.
    pub fn into_record(self, referrer: &User, seller: &Seller) -> Record {
        let mut r = Record::new();
        r.insert("indicated_name".into(), Value::from(self.indicated_name));
        r.insert("indicated_phone".into(), Value::from(self.indicated_phone));
        r.insert("observation".into(), Value::from(self.observation));
        r.insert("user_id".into(), Value::from(referrer.id.as_str()));
        r.insert("user_name".into(), Value::from(referrer.name.as_str()));
        r.insert("seller_id".into(), Value::from(seller.id.as_str()));
        r.insert("seller_name".into(), Value::from(seller.name.as_str()));
        r.insert("status".into(), IndicationStatus::EmContato.into());
        r
    }
}

/// Decode every record of a result set into typed rows.
pub fn decode_rows<T: Row>(records: Vec<Record>) -> Result<Vec<T>, CoreError> {
    records.into_iter().map(T::from_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parse_and_wire_names() {
        assert_eq!(IndicationStatus::parse("fechados"), Some(IndicationStatus::Fechados));
        assert_eq!(IndicationStatus::parse(" NAO_INTERESSADO "), Some(IndicationStatus::NaoInteressado));
        assert_eq!(IndicationStatus::parse("closed"), None);
        assert_eq!(serde_json::to_value(IndicationStatus::EmContato).unwrap(), json!("em_contato"));
    }

    #[test]
    fn indication_decodes_from_record() {
        let rec = json!({
            "id": "1", "indicated_name": "João Silva", "indicated_phone": "(11) 99999-9999",
            "observation": "x", "user_id": "u", "user_name": "U", "seller_id": "s",
            "seller_name": "S", "status": "negociacao", "created_at": "2024-05-01T00:00:00.000Z"
        });
        let ind = Indication::from_record(rec.as_object().cloned().unwrap()).unwrap();
        assert_eq!(ind.status, IndicationStatus::Negociacao);
        assert_eq!(ind.updated_at, None);
    }

    #[test]
    fn record_with_wrong_field_type_is_rejected() {
        let rec = json!({"id": "s1", "name": "A", "active": "yes"});
        let err = Seller::from_record(rec.as_object().cloned().unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));
    }

    #[test]
    fn new_indication_validates_and_builds_record() {
        assert!(NewIndication::new("A", "1112223333", None).is_err());
        assert!(NewIndication::new("Ana", "123", None).is_err());

        let referrer = User {
            id: "mock-user-id".into(),
            email: "usuario@teste.com".into(),
            name: "Usuário Teste".into(),
            role: Role::User,
            created_at: None,
        };
        let seller = Seller {
            id: "vendedor-1".into(),
            name: "Carlos Vendas".into(),
            active: true,
            created_at: None,
        };
        let rec = NewIndication::new(" Test ", "1112223333", None)
            .unwrap()
            .into_record(&referrer, &seller);
        assert_eq!(rec["indicated_name"], json!("Test"));
        assert_eq!(rec["status"], json!("em_contato"));
        assert_eq!(rec["seller_name"], json!("Carlos Vendas"));
        assert_eq!(rec["observation"], json!(""));
        assert!(!rec.contains_key("id"));
    }
}
