//! In-memory implementation of [`AdminRuleStore`].
//!
//! Same locking model as [`InMemoryRuleStore`](crate::InMemoryRuleStore): one
//! `RwLock` over the whole table, with every write applied under it. Admin
//! identifiers include the grant and must be unique across all admin rules.
use crate::priority::{at_priority, make_room, resolve_insert, shift_from};
use crate::{
    AdminRuleQuery, AdminRuleStore, EventPublisher, InsertPosition, NoopPublisher, StoreError,
    StoreResult,
};
use async_trait::async_trait;
use geoacl_authz::{AdminAccessRequest, AdminRule, AdminRuleEvent, AdminRuleId, matches_admin};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Default)]
struct AdminRuleTable {
    last_id: u64,
    rules: BTreeMap<AdminRuleId, AdminRule>,
}

impl AdminRuleTable {
    fn get(&self, id: AdminRuleId) -> StoreResult<&AdminRule> {
        self.rules.get(&id).ok_or_else(|| not_found(id))
    }

    fn get_mut(&mut self, id: AdminRuleId) -> StoreResult<&mut AdminRule> {
        self.rules.get_mut(&id).ok_or_else(|| not_found(id))
    }

    fn next_id(&mut self) -> AdminRuleId {
        self.last_id += 1;
        AdminRuleId::new(self.last_id)
    }

    fn check_duplicates(&self, candidate: &AdminRule, own: Option<AdminRuleId>) -> StoreResult<()> {
        let duplicate = self
            .rules
            .iter()
            .any(|(id, rule)| Some(*id) != own && rule.identifier == candidate.identifier);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "an admin rule with the same identifier already exists: {}",
                candidate.identifier
            )));
        }
        Ok(())
    }
}

pub struct InMemoryAdminRuleStore {
    table: Arc<RwLock<AdminRuleTable>>,
    publisher: Arc<dyn EventPublisher>,
}

impl InMemoryAdminRuleStore {
    pub fn new() -> Self {
        Self::with_publisher(Arc::new(NoopPublisher))
    }

    pub fn with_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            table: Arc::new(RwLock::new(AdminRuleTable::default())),
            publisher,
        }
    }

    fn record(&self, op: &'static str, event: AdminRuleEvent) {
        metrics::counter!("geoacl_rule_changes_total", "kind" => "admin_rule", "op" => op)
            .increment(1);
        self.publisher.publish(event.into());
    }
}

impl Default for InMemoryAdminRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: AdminRuleId) -> StoreError {
    StoreError::NotFound(format!("admin rule {id}"))
}

fn check_priority(priority: i64) -> StoreResult<()> {
    if priority < 0 {
        return Err(StoreError::Validation(format!(
            "negative priority is not allowed: {priority}"
        )));
    }
    Ok(())
}

#[async_trait]
impl AdminRuleStore for InMemoryAdminRuleStore {
    async fn find_by_id(&self, id: AdminRuleId) -> StoreResult<Option<AdminRule>> {
        Ok(self.table.read().await.rules.get(&id).cloned())
    }

    async fn find_one_by_priority(&self, priority: i64) -> StoreResult<Option<AdminRule>> {
        let table = self.table.read().await;
        match at_priority(&table.rules, priority).as_slice() {
            [] => Ok(None),
            [rule] => Ok(Some((*rule).clone())),
            _ => Err(StoreError::Conflict(format!(
                "multiple admin rules share priority {priority}"
            ))),
        }
    }

    async fn count(&self, filter: Option<&AdminAccessRequest>) -> StoreResult<usize> {
        let table = self.table.read().await;
        Ok(match filter {
            None => table.rules.len(),
            Some(request) => table
                .rules
                .values()
                .filter(|rule| matches_admin(rule, request))
                .count(),
        })
    }

    async fn find_all(&self, query: &AdminRuleQuery) -> StoreResult<Vec<AdminRule>> {
        let table = self.table.read().await;
        let mut rules: Vec<AdminRule> = table
            .rules
            .range(query.next_cursor.unwrap_or(AdminRuleId::new(0))..)
            .map(|(_, rule)| rule)
            .filter(|rule| {
                query
                    .filter
                    .as_ref()
                    .is_none_or(|request| matches_admin(rule, request))
            })
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.priority);
        if let Some(page_size) = query.page_size {
            rules.truncate(page_size);
        }
        Ok(rules)
    }

    async fn create(&self, mut rule: AdminRule, position: InsertPosition) -> StoreResult<AdminRule> {
        if rule.id.is_some() {
            return Err(StoreError::Validation(
                "a new admin rule must not carry an id".to_string(),
            ));
        }
        check_priority(rule.priority)?;

        let mut table = self.table.write().await;
        table.check_duplicates(&rule, None)?;
        let priority = resolve_insert(table.rules.values(), rule.priority, position);
        let shifted = make_room(&mut table.rules, priority, None)?;
        let id = table.next_id();
        rule.id = Some(id);
        rule.priority = priority;
        table.rules.insert(id, rule.clone());
        metrics::gauge!("geoacl_admin_rules_total").set(table.rules.len() as f64);
        info!(admin_rule_id = %id, priority, access = %rule.access(), shifted, "admin rule created");
        self.record("created", AdminRuleEvent::created(id));
        Ok(rule)
    }

    async fn save(&self, rule: AdminRule) -> StoreResult<AdminRule> {
        let Some(id) = rule.id else {
            return Err(StoreError::Validation(
                "a saved admin rule must carry an id".to_string(),
            ));
        };
        check_priority(rule.priority)?;

        let mut table = self.table.write().await;
        let previous = table.get(id)?.priority;
        table.check_duplicates(&rule, Some(id))?;
        if previous != rule.priority {
            make_room(&mut table.rules, rule.priority, Some(id))?;
        }
        table.rules.insert(id, rule.clone());
        info!(admin_rule_id = %id, priority = rule.priority, "admin rule saved");
        self.record("updated", AdminRuleEvent::updated([id]));
        Ok(rule)
    }

    async fn delete_by_id(&self, id: AdminRuleId) -> StoreResult<bool> {
        let mut table = self.table.write().await;
        if table.rules.remove(&id).is_none() {
            return Ok(false);
        }
        metrics::gauge!("geoacl_admin_rules_total").set(table.rules.len() as f64);
        info!(admin_rule_id = %id, "admin rule deleted");
        self.record("deleted", AdminRuleEvent::deleted(id));
        Ok(true)
    }

    async fn exists_by_id(&self, id: AdminRuleId) -> StoreResult<bool> {
        Ok(self.table.read().await.rules.contains_key(&id))
    }

    async fn shift(&self, start: i64, offset: i64) -> StoreResult<i64> {
        if offset <= 0 {
            return Err(StoreError::Validation(format!(
                "positive offset required, got {offset}"
            )));
        }
        let mut table = self.table.write().await;
        let moved = shift_from(&mut table.rules, start, offset)?;
        if moved.is_empty() {
            return Ok(-1);
        }
        let count = moved.len() as i64;
        info!(start, offset, moved = count, "admin rule priorities shifted");
        self.record("updated", AdminRuleEvent::updated(moved));
        Ok(count)
    }

    async fn swap(&self, id1: AdminRuleId, id2: AdminRuleId) -> StoreResult<()> {
        let mut table = self.table.write().await;
        let p1 = table.get(id1)?.priority;
        let p2 = table.get(id2)?.priority;
        table.get_mut(id1)?.priority = p2;
        table.get_mut(id2)?.priority = p1;
        info!(rule_a = %id1, rule_b = %id2, "admin rule priorities swapped");
        self.record("updated", AdminRuleEvent::updated([id1, id2]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_channel;
    use geoacl_authz::{AclEvent, EventType};

    #[tokio::test]
    async fn create_and_lookup() {
        let store = InMemoryAdminRuleStore::new();
        let admin = store
            .create(
                AdminRule::admin().with_priority(1).with_workspace("w1"),
                InsertPosition::Fixed,
            )
            .await
            .expect("create");
        let id = admin.id.expect("id");
        assert!(store.exists_by_id(id).await.expect("exists"));
        assert_eq!(store.find_by_id(id).await.expect("find"), Some(admin.clone()));
        assert_eq!(
            store.find_one_by_priority(1).await.expect("by priority"),
            Some(admin)
        );
        assert_eq!(store.find_one_by_priority(2).await.expect("none"), None);
    }

    #[tokio::test]
    async fn identifiers_unique_including_access() {
        let store = InMemoryAdminRuleStore::new();
        store
            .create(AdminRule::admin().with_priority(1).with_username("u"), InsertPosition::Fixed)
            .await
            .expect("admin");
        let err = store
            .create(AdminRule::admin().with_priority(2).with_username("u"), InsertPosition::Fixed)
            .await
            .expect_err("dup");
        assert!(matches!(err, StoreError::Conflict(_)));
        store
            .create(AdminRule::user().with_priority(2).with_username("u"), InsertPosition::Fixed)
            .await
            .expect("user variant");
    }

    #[tokio::test]
    async fn priority_invariants_mirror_rule_store() {
        let store = InMemoryAdminRuleStore::new();
        for (priority, ws) in [(1, "a"), (2, "b")] {
            store
                .create(
                    AdminRule::user().with_priority(priority).with_workspace(ws),
                    InsertPosition::Fixed,
                )
                .await
                .expect("create");
        }
        let inserted = store
            .create(AdminRule::admin().with_priority(1).with_workspace("c"), InsertPosition::Fixed)
            .await
            .expect("insert at top");
        assert_eq!(inserted.priority, 1);
        let listed: Vec<i64> = store
            .find_all(&AdminRuleQuery::all())
            .await
            .expect("list")
            .iter()
            .map(|r| r.priority)
            .collect();
        assert_eq!(listed, vec![1, 2, 3]);

        assert!(matches!(store.shift(1, -2).await, Err(StoreError::Validation(_))));
        assert_eq!(store.shift(10, 1).await.expect("noop"), -1);
        assert!(matches!(store.shift(0, i64::MAX).await, Err(StoreError::Validation(_))));
        assert_eq!(
            store.find_one_by_priority(1).await.expect("lookup").map(|r| r.priority),
            Some(1)
        );
        assert!(matches!(
            store
                .create(AdminRule::admin().with_priority(-5), InsertPosition::Fixed)
                .await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn filtered_listing_and_count() {
        let store = InMemoryAdminRuleStore::new();
        store
            .create(AdminRule::admin().with_priority(2).with_workspace("w1"), InsertPosition::Fixed)
            .await
            .expect("w1");
        store
            .create(AdminRule::user().with_priority(1), InsertPosition::Fixed)
            .await
            .expect("any");
        let w1 = AdminAccessRequest::new().with_workspace("w1");
        assert_eq!(store.count(Some(&w1)).await.expect("count"), 2);
        let w2 = AdminAccessRequest::new().with_workspace("w2");
        let listed = store
            .find_all(&AdminRuleQuery::matching(w2))
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].priority, 1);
    }

    #[tokio::test]
    async fn writes_publish_admin_events() {
        let (publisher, mut rx) = event_channel();
        let store = InMemoryAdminRuleStore::with_publisher(Arc::new(publisher));
        let a = store
            .create(AdminRule::admin().with_priority(1), InsertPosition::Fixed)
            .await
            .expect("a");
        let b = store
            .create(AdminRule::user().with_priority(2), InsertPosition::Fixed)
            .await
            .expect("b");
        let (a_id, b_id) = (a.id.expect("id"), b.id.expect("id"));
        store.swap(a_id, b_id).await.expect("swap");
        store.delete_by_id(a_id).await.expect("delete");

        let mut seen = Vec::new();
        while let Ok(AclEvent::AdminRule(event)) = rx.try_recv() {
            seen.push((event.event_type, event.rule_ids.len()));
        }
        assert_eq!(
            seen,
            vec![
                (EventType::Created, 1),
                (EventType::Created, 1),
                (EventType::Updated, 2),
                (EventType::Deleted, 1),
            ]
        );
    }
}
