//! Referral workflows on top of the backend contract: submitting indications,
//! the pipeline board and the dashboard numbers.
//!
//! Everything goes through `from`/`auth` with explicit terminals, so the same
//! code would run against a hosted backend with the same surface.

use std::sync::Arc;

use domain::assign::SellerPicker;
use domain::schema::{Indication, IndicationStatus, NewIndication, Role, Row, Seller, User};
use domain::stats::{self, AdminStats, KanbanColumn, TopReferrer, UserStats};
use domain::{iso8601, record_id, Clock, CoreError, ErrorBody, Record, Value};
use local_backend::{AuthError, LocalBackend, QueryResponse, Session};
use serde_json::json;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("no active sellers to assign the indication to")]
    NoActiveSellers,
    #[error("indication {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Domain(#[from] CoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<ErrorBody> for ServiceError {
    fn from(err: ErrorBody) -> Self {
        ServiceError::Backend(err.message)
    }
}

pub struct ReferralService {
    backend: LocalBackend,
    picker: Arc<dyn SellerPicker>,
    clock: Arc<dyn Clock>,
}

impl ReferralService {
    pub fn new(backend: LocalBackend, picker: Arc<dyn SellerPicker>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, picker, clock }
    }

    pub fn backend(&self) -> &LocalBackend {
        &self.backend
    }

    /// The persisted session, or `NotSignedIn`.
    pub async fn session(&self) -> Result<Session, ServiceError> {
        let resp = self.backend.auth().get_session().await;
        if let Some(err) = resp.error {
            return Err(err.into());
        }
        resp.session.ok_or(ServiceError::NotSignedIn)
    }

    /// Assign a random active seller and store the indication as `em_contato`.
    pub async fn submit_indication(&self, session: &Session, input: NewIndication) -> Result<Indication, ServiceError> {
        let sellers: Vec<Seller> = valid_rows(self.backend.table::<Seller>().eq("active", true).execute().await)?;
        let seller = self
            .picker
            .pick(&sellers)
            .and_then(|idx| sellers.get(idx))
            .ok_or(ServiceError::NoActiveSellers)?;

        let referrer = User {
            id: session.user.id.clone(),
            email: session.user.email.clone(),
            name: session.user.name.clone(),
            role: session.user.role,
            created_at: None,
        };
        let record = input.into_record(&referrer, seller);
        let stored: Vec<Indication> = self.backend.table::<Indication>().insert(record).await.rows()?;
        let indication = stored
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Backend("insert returned no record".into()))?;

        let payload = json!({
            "indicated_name": indication.indicated_name,
            "indicated_phone": indication.indicated_phone,
            "observation": indication.observation,
            "user_name": indication.user_name,
            "seller_name": indication.seller_name,
            "created_at": indication.created_at,
        });
        info!(id = %indication.id, seller_id = %seller.id, webhook_payload = %payload, "indication submitted");
        Ok(indication)
    }

    /// All indications, newest first, grouped by pipeline stage.
    pub async fn board(&self) -> Result<Vec<KanbanColumn>, ServiceError> {
        let rows: Vec<Indication> =
            valid_rows(self.backend.table::<Indication>().order("created_at", false).execute().await)?;
        Ok(stats::board(rows))
    }

    pub async fn move_indication(&self, id: &str, status: IndicationStatus) -> Result<Indication, ServiceError> {
        let mut patch = Record::new();
        patch.insert("status".into(), status.into());
        patch.insert("updated_at".into(), Value::from(iso8601(self.clock.now())));

        let updated: Vec<Indication> = self.backend.table::<Indication>().eq("id", id).update(patch).await.rows()?;
        let moved = updated
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        debug!(id, status = status.as_str(), "indication moved");
        Ok(moved)
    }

    pub async fn sellers(&self) -> Result<Vec<Seller>, ServiceError> {
        valid_rows(self.backend.table::<Seller>().order("name", true).execute().await)
    }

    pub async fn admin_stats(&self) -> Result<AdminStats, ServiceError> {
        let users: Vec<User> = valid_rows(self.backend.table::<User>().execute().await)?;
        let indications: Vec<Indication> = valid_rows(self.backend.table::<Indication>().execute().await)?;
        let since = stats::month_start(self.clock.now());
        Ok(stats::admin_stats(&users, &indications, &since))
    }

    pub async fn user_stats(&self, user_id: &str) -> Result<UserStats, ServiceError> {
        let own: Vec<Indication> =
            valid_rows(self.backend.table::<Indication>().eq("user_id", user_id).execute().await)?;
        let since = stats::month_start(self.clock.now());
        Ok(stats::user_stats(&own, &since))
    }

    pub async fn top_referrers(&self, limit: usize) -> Result<Vec<TopReferrer>, ServiceError> {
        let all: Vec<Indication> = valid_rows(self.backend.table::<Indication>().execute().await)?;
        Ok(stats::top_referrers(&all, limit))
    }

    /// Admins see the whole system, referrers only their own indications.
    pub async fn dashboard(&self, session: &Session) -> Result<Value, ServiceError> {
        let value = match session.user.role {
            Role::Admin => serde_json::to_value(self.admin_stats().await?),
            Role::User => serde_json::to_value(self.user_stats(&session.user.id).await?),
        };
        value.map_err(|e| ServiceError::Backend(e.to_string()))
    }
}

/// Decode a result set, skipping (and logging) records that don't fit `T`'s
/// schema. Collections accept open records.
fn valid_rows<T: Row>(resp: QueryResponse) -> Result<Vec<T>, ServiceError> {
    if let Some(err) = resp.error {
        return Err(err.into());
    }
    let rows = resp
        .data
        .into_iter()
        .filter_map(|record| {
            let id = record_id(&record).unwrap_or_default().to_string();
            match T::from_record(record) {
                Ok(row) => Some(row),
                Err(e) => {
                    warn!(collection = T::COLLECTION, %id, error = %e, "skipping record that does not fit the schema");
                    None
                }
            }
        })
        .collect();
    Ok(rows)
}
