use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

use crate::Database;
use crate::models::{ChannelSummaryRow, Pagination};

/// `u` is the listed user; `?2` is the viewer.
const CHANNEL_SUMMARY_COLUMNS: &str = "u.id, u.username, u.full_name, u.avatar_url,
    (SELECT COUNT(*) FROM subscriptions x WHERE x.channel_id = u.id),
    EXISTS(SELECT 1 FROM subscriptions x WHERE x.channel_id = u.id AND x.subscriber_id = ?2)";

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelSummaryRow> {
    Ok(ChannelSummaryRow {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        avatar_url: row.get(3)?,
        subscribers_count: row.get(4)?,
        is_subscribed: row.get(5)?,
    })
}

impl Database {
    // -- Subscriptions --

    /// Toggle the subscriber → channel edge. Returns `None` if the channel
    /// does not exist, otherwise whether the user is subscribed afterwards.
    pub fn toggle_subscription(
        &self,
        subscriber_id: &str,
        channel_id: &str,
    ) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let channel_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                [channel_id],
                |r| r.get(0),
            )?;
            if !channel_exists {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
                params![subscriber_id, channel_id],
            )?;

            let active = if removed > 0 {
                false
            } else {
                tx.execute(
                    "INSERT OR IGNORE INTO subscriptions (id, subscriber_id, channel_id) VALUES (?1, ?2, ?3)",
                    params![Uuid::new_v4().to_string(), subscriber_id, channel_id],
                )?;
                true
            };

            tx.commit()?;
            Ok(Some(active))
        })
    }

    /// Users subscribed to `channel_id`, newest first, with their own
    /// subscriber counts and whether the viewer follows each of them.
    pub fn channel_subscribers(
        &self,
        channel_id: &str,
        viewer_id: &str,
        page: Pagination,
    ) -> Result<(Vec<ChannelSummaryRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1",
                [channel_id],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {CHANNEL_SUMMARY_COLUMNS}
                 FROM subscriptions s
                 JOIN users u ON u.id = s.subscriber_id
                 WHERE s.channel_id = ?1
                 ORDER BY s.created_at DESC, s.rowid DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt
                .query_map(
                    params![channel_id, viewer_id, page.limit, page.offset()],
                    summary_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok((rows, total))
        })
    }

    /// Channels `subscriber_id` follows, newest first.
    pub fn subscribed_channels(
        &self,
        subscriber_id: &str,
        viewer_id: &str,
        page: Pagination,
    ) -> Result<(Vec<ChannelSummaryRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?1",
                [subscriber_id],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {CHANNEL_SUMMARY_COLUMNS}
                 FROM subscriptions s
                 JOIN users u ON u.id = s.channel_id
                 WHERE s.subscriber_id = ?1
                 ORDER BY s.created_at DESC, s.rowid DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt
                .query_map(
                    params![subscriber_id, viewer_id, page.limit, page.offset()],
                    summary_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok((rows, total))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{open_temp, user};

    #[test]
    fn toggle_subscription_round_trip() {
        let (_dir, db) = open_temp();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        assert_eq!(db.toggle_subscription(&bob, &alice).unwrap(), Some(true));
        let profile = db.channel_profile("alice", &bob).unwrap().unwrap();
        assert_eq!(profile.subscribers_count, 1);
        assert!(profile.is_subscribed);

        assert_eq!(db.toggle_subscription(&bob, &alice).unwrap(), Some(false));
        assert_eq!(db.toggle_subscription(&bob, "no-such-user").unwrap(), None);
        let profile = db.channel_profile("alice", &bob).unwrap().unwrap();
        assert_eq!(profile.subscribers_count, 0);
        assert!(!profile.is_subscribed);
    }

    #[test]
    fn subscriber_lists_carry_viewer_flags() {
        let (_dir, db) = open_temp();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");

        db.toggle_subscription(&bob, &alice).unwrap();
        db.toggle_subscription(&carol, &alice).unwrap();
        db.toggle_subscription(&alice, &carol).unwrap();

        let (subs, total) = db.channel_subscribers(&alice, &alice, Default::default()).unwrap();
        assert_eq!(total, 2);
        let carol_row = subs.iter().find(|s| s.id == carol).unwrap();
        assert!(carol_row.is_subscribed);
        assert_eq!(carol_row.subscribers_count, 1);
        let bob_row = subs.iter().find(|s| s.id == bob).unwrap();
        assert!(!bob_row.is_subscribed);

        let (channels, total) = db.subscribed_channels(&bob, &bob, Default::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(channels[0].username, "alice");
        assert_eq!(channels[0].subscribers_count, 2);

        let profile = db.channel_profile("alice", &carol).unwrap().unwrap();
        assert_eq!(profile.channels_subscribed_to_count, 1);
    }
}
