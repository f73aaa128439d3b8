//! Dashboard aggregates over typed rows: pipeline board, admin and referrer
//! statistics, and the referrer ranking.

use std::time::SystemTime;

use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Utc};
use serde::Serialize;

use crate::schema::{Indication, IndicationStatus, Role, User};

/// Default number of entries in the referrer ranking.
pub const TOP_REFERRERS: usize = 4;

/// ISO-8601 timestamp of the first instant of `now`'s month (UTC). Comparable
/// lexicographically with stored `created_at` values.
pub fn month_start(now: SystemTime) -> String {
    let now = DateTime::<Utc>::from(now);
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    start.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One column of the pipeline board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KanbanColumn {
    pub status: IndicationStatus,
    pub title: &'static str,
    pub indications: Vec<Indication>,
}

impl KanbanColumn {
    pub fn count(&self) -> usize {
        self.indications.len()
    }
}

/// Group indications into one column per status, in pipeline order. Input
/// order is kept inside each column.
pub fn board(indications: Vec<Indication>) -> Vec<KanbanColumn> {
    let mut columns: Vec<KanbanColumn> = IndicationStatus::ALL
        .into_iter()
        .map(|status| KanbanColumn {
            status,
            title: status.title(),
            indications: Vec::new(),
        })
        .collect();
    for ind in indications {
        if let Some(col) = columns.iter_mut().find(|c| c.status == ind.status) {
            col.indications.push(ind);
        }
    }
    columns
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub total_users: usize,
    pub total_indications: usize,
    pub monthly_indications: usize,
    pub closed_deals: usize,
    pub not_interested: usize,
}

/// Admin dashboard cards. Only accounts with the `user` role count as users.
pub fn admin_stats(users: &[User], indications: &[Indication], since: &str) -> AdminStats {
    AdminStats {
        total_users: users.iter().filter(|u| u.role == Role::User).count(),
        total_indications: indications.len(),
        monthly_indications: indications.iter().filter(|i| i.created_at.as_str() >= since).count(),
        closed_deals: count_status(indications, IndicationStatus::Fechados),
        not_interested: count_status(indications, IndicationStatus::NaoInteressado),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total_indications: usize,
    pub monthly_indications: usize,
    pub closed_deals: usize,
    pub pending_deals: usize,
    pub not_interested: usize,
}

/// Referrer dashboard cards over that referrer's own indications.
pub fn user_stats(own: &[Indication], since: &str) -> UserStats {
    UserStats {
        total_indications: own.len(),
        monthly_indications: own.iter().filter(|i| i.created_at.as_str() >= since).count(),
        closed_deals: count_status(own, IndicationStatus::Fechados),
        pending_deals: own.iter().filter(|i| !i.status.is_settled()).count(),
        not_interested: count_status(own, IndicationStatus::NaoInteressado),
    }
}

fn count_status(indications: &[Indication], status: IndicationStatus) -> usize {
    indications.iter().filter(|i| i.status == status).count()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopReferrer {
    /// 1-based rank.
    pub position: usize,
    pub user_id: String,
    pub user_name: String,
    pub total_indications: usize,
}

/// Rank referrers by number of indications, most first. Ties keep the order
/// in which referrers first appear.
pub fn top_referrers(indications: &[Indication], limit: usize) -> Vec<TopReferrer> {
    let mut tally: Vec<(String, String, usize)> = Vec::new();
    for ind in indications {
        match tally.iter_mut().find(|(id, _, _)| *id == ind.user_id) {
            Some(entry) => entry.2 += 1,
            None => tally.push((ind.user_id.clone(), ind.user_name.clone(), 1)),
        }
    }
    tally.sort_by(|a, b| b.2.cmp(&a.2));
    tally
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (user_id, user_name, total_indications))| TopReferrer {
            position: i + 1,
            user_id,
            user_name,
            total_indications,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ind(id: &str, user: &str, status: IndicationStatus, created_at: &str) -> Indication {
        Indication {
            id: id.into(),
            indicated_name: format!("Lead {id}"),
            indicated_phone: "1112223333".into(),
            observation: None,
            user_id: user.into(),
            user_name: user.to_uppercase(),
            seller_id: "vendedor-1".into(),
            seller_name: "Carlos Vendas".into(),
            status,
            created_at: created_at.into(),
            updated_at: None,
        }
    }

    fn sample() -> Vec<Indication> {
        use IndicationStatus::*;
        vec![
            ind("1", "u1", EmContato, "2024-04-30T23:59:59.999Z"),
            ind("2", "u2", Fechados, "2024-05-02T10:00:00.000Z"),
            ind("3", "u2", NaoInteressado, "2024-05-03T10:00:00.000Z"),
            ind("4", "u2", Negociacao, "2024-05-04T10:00:00.000Z"),
            ind("5", "u3", Fechamento, "2024-05-05T10:00:00.000Z"),
            ind("6", "u1", Fechados, "2024-05-06T10:00:00.000Z"),
        ]
    }

    #[test]
    fn month_start_truncates_to_first_day() {
        // 2024-05-17T15:04:05Z
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_715_958_245);
        assert_eq!(month_start(t), "2024-05-01T00:00:00.000Z");
    }

    #[test]
    fn board_groups_in_pipeline_order() {
        let cols = board(sample());
        let titles: Vec<_> = cols.iter().map(|c| c.title).collect();
        assert_eq!(titles, ["Em Contato", "Negociação", "Fechamento", "Fechados", "Não Interessados"]);
        let counts: Vec<_> = cols.iter().map(KanbanColumn::count).collect();
        assert_eq!(counts, [1, 1, 1, 2, 1]);
        assert_eq!(cols[3].indications[0].id, "2");
    }

    #[test]
    fn admin_stats_counts() {
        let users = vec![
            User { id: "a".into(), email: "a@x.com".into(), name: "A".into(), role: Role::Admin, created_at: None },
            User { id: "u".into(), email: "u@x.com".into(), name: "U".into(), role: Role::User, created_at: None },
        ];
        let stats = admin_stats(&users, &sample(), "2024-05-01T00:00:00.000Z");
        assert_eq!(
            stats,
            AdminStats {
                total_users: 1,
                total_indications: 6,
                monthly_indications: 5,
                closed_deals: 2,
                not_interested: 1,
            }
        );
    }

    #[test]
    fn user_stats_pending_excludes_settled() {
        let own: Vec<_> = sample().into_iter().filter(|i| i.user_id == "u2").collect();
        let stats = user_stats(&own, "2024-05-01T00:00:00.000Z");
        assert_eq!(stats.total_indications, 3);
        assert_eq!(stats.monthly_indications, 3);
        assert_eq!(stats.closed_deals, 1);
        assert_eq!(stats.pending_deals, 1);
        assert_eq!(stats.not_interested, 1);
    }

    #[test]
    fn ranking_orders_by_count_then_first_seen() {
        let top = top_referrers(&sample(), TOP_REFERRERS);
        let order: Vec<_> = top.iter().map(|t| (t.position, t.user_id.as_str(), t.total_indications)).collect();
        assert_eq!(order, [(1, "u2", 3), (2, "u1", 2), (3, "u3", 1)]);

        assert_eq!(top_referrers(&sample(), 1).len(), 1);
    }
}
