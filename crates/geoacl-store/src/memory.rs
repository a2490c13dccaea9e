//! In-memory implementation of [`RuleStore`].
//!
//! # Purpose
//! Holds every rule in a `BTreeMap` guarded by a single `tokio::sync::RwLock`.
//! It exists for:
//! - tests and local tooling (no external dependencies)
//! - hosts that load a rule set at startup and keep it in memory
//!
//! # Consistency
//! Each write runs entirely under the write lock, so the priority shift that
//! makes room for a rule and the insert itself are observed together. Reads
//! take the read lock and never see a half-applied write.
//!
//! # Performance characteristics
//! - Duplicate detection scans every rule on each write.
//! - Listing clones and sorts the matched rules.
//! Both are fine for rule sets in the thousands.
//!
//! # Metrics
//! - `geoacl_rules_total` gauge after each create/delete.
//! - `geoacl_rule_changes_total{kind="rule", op}` counter per write.
use crate::priority::{at_priority, make_room, resolve_insert, shift_from};
use crate::{
    EventPublisher, InsertPosition, NoopPublisher, RuleQuery, RuleStore, StoreError, StoreResult,
};
use async_trait::async_trait;
use geoacl_authz::{
    Access, AccessRequest, GrantType, LayerDetails, PolicyFilter, Rule, RuleEvent, RuleId,
    RuleLimits,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct RuleTable {
    /// Last id handed out; ids are never reused.
    last_id: u64,
    rules: BTreeMap<RuleId, Rule>,
}

impl RuleTable {
    fn get(&self, id: RuleId) -> StoreResult<&Rule> {
        self.rules.get(&id).ok_or_else(|| not_found(id))
    }

    fn get_mut(&mut self, id: RuleId) -> StoreResult<&mut Rule> {
        self.rules.get_mut(&id).ok_or_else(|| not_found(id))
    }

    fn next_id(&mut self) -> RuleId {
        self.last_id += 1;
        RuleId::new(self.last_id)
    }

    /// Non-LIMIT identifier tuples must be unique; `own` is skipped on update.
    fn check_duplicates(&self, candidate: &Rule, own: Option<RuleId>) -> StoreResult<()> {
        if candidate.grant() == GrantType::Limit {
            return Ok(());
        }
        let key = candidate.identity_key();
        let duplicate = self
            .rules
            .iter()
            .any(|(id, rule)| Some(*id) != own && rule.identity_key() == key);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "a rule with the same identifier already exists: {} {}",
                candidate.identifier,
                candidate.grant()
            )));
        }
        Ok(())
    }
}

pub struct InMemoryRuleStore {
    table: Arc<RwLock<RuleTable>>,
    publisher: Arc<dyn EventPublisher>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::with_publisher(Arc::new(NoopPublisher))
    }

    pub fn with_publisher(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            table: Arc::new(RwLock::new(RuleTable::default())),
            publisher,
        }
    }

    fn record(&self, op: &'static str, event: RuleEvent) {
        metrics::counter!("geoacl_rule_changes_total", "kind" => "rule", "op" => op).increment(1);
        self.publisher.publish(event.into());
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: RuleId) -> StoreError {
    StoreError::NotFound(format!("rule {id}"))
}

fn check_priority(priority: i64) -> StoreResult<()> {
    if priority < 0 {
        return Err(StoreError::Validation(format!(
            "negative priority is not allowed: {priority}"
        )));
    }
    Ok(())
}

/// Layer details only make sense for a rule bound to one layer.
fn check_payload(rule: &Rule) -> StoreResult<()> {
    if rule.access.layer_details().is_some() && rule.identifier.layer.is_none() {
        return Err(StoreError::Validation(
            "layer details require a rule with a concrete layer".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn find_by_id(&self, id: RuleId) -> StoreResult<Option<Rule>> {
        Ok(self.table.read().await.rules.get(&id).cloned())
    }

    async fn find_one_by_priority(&self, priority: i64) -> StoreResult<Option<Rule>> {
        let table = self.table.read().await;
        match at_priority(&table.rules, priority).as_slice() {
            [] => Ok(None),
            [rule] => Ok(Some((*rule).clone())),
            _ => Err(StoreError::Conflict(format!(
                "multiple rules share priority {priority}"
            ))),
        }
    }

    async fn count(&self, filter: Option<&AccessRequest>) -> StoreResult<usize> {
        let table = self.table.read().await;
        let Some(request) = filter else {
            return Ok(table.rules.len());
        };
        let filter = PolicyFilter::new(request);
        Ok(table
            .rules
            .values()
            .filter(|rule| filter.matches_structure(&rule.identifier))
            .count())
    }

    async fn find_all(&self, query: &RuleQuery) -> StoreResult<Vec<Rule>> {
        let table = self.table.read().await;
        let filter = query.filter.as_ref().map(PolicyFilter::new);
        if filter.is_some_and(|f| f.is_fail_closed()) {
            debug!("unparseable source address; no rules listed");
            return Ok(Vec::new());
        }
        let mut rules: Vec<Rule> = table
            .rules
            .range(query.next_cursor.unwrap_or(RuleId::new(0))..)
            .map(|(_, rule)| rule)
            .filter(|rule| filter.is_none_or(|f| f.matches(rule)))
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.priority);
        if let Some(page_size) = query.page_size {
            rules.truncate(page_size);
        }
        Ok(rules)
    }

    async fn create(&self, mut rule: Rule, position: InsertPosition) -> StoreResult<Rule> {
        if rule.id.is_some() {
            return Err(StoreError::Validation(
                "a new rule must not carry an id".to_string(),
            ));
        }
        check_priority(rule.priority)?;
        check_payload(&rule)?;

        let mut table = self.table.write().await;
        table.check_duplicates(&rule, None)?;
        let priority = resolve_insert(table.rules.values(), rule.priority, position);
        let shifted = make_room(&mut table.rules, priority, None)?;
        let id = table.next_id();
        rule.id = Some(id);
        rule.priority = priority;
        table.rules.insert(id, rule.clone());
        metrics::gauge!("geoacl_rules_total").set(table.rules.len() as f64);
        info!(rule_id = %id, priority, grant = %rule.grant(), shifted, "rule created");
        self.record("created", RuleEvent::created(id));
        Ok(rule)
    }

    async fn save(&self, rule: Rule) -> StoreResult<Rule> {
        let Some(id) = rule.id else {
            return Err(StoreError::Validation(
                "a saved rule must carry an id".to_string(),
            ));
        };
        check_priority(rule.priority)?;
        check_payload(&rule)?;

        let mut table = self.table.write().await;
        let previous = table.get(id)?.priority;
        table.check_duplicates(&rule, Some(id))?;
        if previous != rule.priority {
            make_room(&mut table.rules, rule.priority, Some(id))?;
        }
        table.rules.insert(id, rule.clone());
        info!(rule_id = %id, priority = rule.priority, "rule saved");
        self.record("updated", RuleEvent::updated([id]));
        Ok(rule)
    }

    async fn delete_by_id(&self, id: RuleId) -> StoreResult<bool> {
        let mut table = self.table.write().await;
        if table.rules.remove(&id).is_none() {
            return Ok(false);
        }
        metrics::gauge!("geoacl_rules_total").set(table.rules.len() as f64);
        info!(rule_id = %id, "rule deleted");
        self.record("deleted", RuleEvent::deleted(id));
        Ok(true)
    }

    async fn exists_by_id(&self, id: RuleId) -> StoreResult<bool> {
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
        info!(start, offset, moved = moved.len(), "rule priorities shifted");
        let count = moved.len() as i64;
        self.record("updated", RuleEvent::updated(moved));
        Ok(count)
    }

    async fn swap(&self, id1: RuleId, id2: RuleId) -> StoreResult<()> {
        let mut table = self.table.write().await;
        let p1 = table.get(id1)?.priority;
        let p2 = table.get(id2)?.priority;
        table.get_mut(id1)?.priority = p2;
        table.get_mut(id2)?.priority = p1;
        info!(rule_a = %id1, rule_b = %id2, "rule priorities swapped");
        self.record("updated", RuleEvent::updated([id1, id2]));
        Ok(())
    }

    async fn set_allowed_styles(&self, id: RuleId, styles: BTreeSet<String>) -> StoreResult<()> {
        let mut table = self.table.write().await;
        let rule = table.get_mut(id)?;
        if rule.identifier.layer.is_none() {
            return Err(StoreError::Validation(format!(
                "rule {id} has no layer; cannot set allowed styles"
            )));
        }
        let Access::Allow {
            layer_details: Some(details),
        } = &mut rule.access
        else {
            return Err(StoreError::Validation(format!(
                "rule {id} has no layer details"
            )));
        };
        details.allowed_styles = styles;
        self.record("updated", RuleEvent::updated([id]));
        Ok(())
    }

    async fn set_limits(&self, id: RuleId, limits: Option<RuleLimits>) -> StoreResult<()> {
        let mut table = self.table.write().await;
        let rule = table.get_mut(id)?;
        match &mut rule.access {
            Access::Limit { limits: slot } => *slot = limits,
            _ if limits.is_some() => {
                return Err(StoreError::Validation(format!(
                    "rule {id} is not of LIMIT type"
                )));
            }
            _ => {}
        }
        self.record("updated", RuleEvent::updated([id]));
        Ok(())
    }

    async fn set_layer_details(
        &self,
        id: RuleId,
        details: Option<LayerDetails>,
    ) -> StoreResult<()> {
        let mut table = self.table.write().await;
        let rule = table.get_mut(id)?;
        if details.is_some() && rule.identifier.layer.is_none() {
            return Err(StoreError::Validation(format!(
                "rule {id} does not refer to a fixed layer"
            )));
        }
        match &mut rule.access {
            Access::Allow { layer_details } => *layer_details = details,
            _ if details.is_some() => {
                return Err(StoreError::Validation(format!(
                    "rule {id} is not of ALLOW type"
                )));
            }
            _ => {}
        }
        self.record("updated", RuleEvent::updated([id]));
        Ok(())
    }

    async fn find_layer_details_by_rule_id(&self, id: RuleId) -> StoreResult<Option<LayerDetails>> {
        let table = self.table.read().await;
        Ok(table.get(id)?.access.layer_details().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_channel;
    use geoacl_authz::{AclEvent, EventType, IpAddressRange};

    async fn store_with(rules: Vec<Rule>) -> InMemoryRuleStore {
        let store = InMemoryRuleStore::new();
        for rule in rules {
            store
                .create(rule, InsertPosition::Fixed)
                .await
                .expect("create");
        }
        store
    }

    async fn priorities(store: &InMemoryRuleStore) -> Vec<i64> {
        store
            .find_all(&RuleQuery::all())
            .await
            .expect("list")
            .iter()
            .map(|r| r.priority)
            .collect()
    }

    #[tokio::test]
    async fn create_assigns_id_and_rejects_bad_input() {
        let store = InMemoryRuleStore::new();
        let created = store
            .create(Rule::allow().with_priority(1), InsertPosition::Fixed)
            .await
            .expect("create");
        assert!(created.id.is_some());

        let with_id = Rule::allow().with_id(RuleId::new(9)).with_layer("x");
        let err = store.create(with_id, InsertPosition::Fixed).await.expect_err("id");
        assert!(matches!(err, StoreError::Validation(_)));

        let negative = Rule::deny().with_priority(-1);
        let err = store.create(negative, InsertPosition::Fixed).await.expect_err("neg");
        assert!(matches!(err, StoreError::Validation(_)));

        let wildcard_details = Rule::allow()
            .with_priority(3)
            .with_layer_details(LayerDetails::default());
        let err = store
            .create(wildcard_details, InsertPosition::Fixed)
            .await
            .expect_err("details on wildcard layer");
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn create_at_occupied_priority_shifts_followers() {
        let store = store_with(vec![
            Rule::allow().with_priority(1).with_layer("a"),
            Rule::allow().with_priority(2).with_layer("b"),
            Rule::allow().with_priority(3).with_layer("c"),
        ])
        .await;
        let inserted = store
            .create(Rule::deny().with_priority(2).with_layer("new"), InsertPosition::Fixed)
            .await
            .expect("create");
        assert_eq!(inserted.priority, 2);
        assert_eq!(priorities(&store).await, vec![1, 2, 3, 4]);

        let layers: Vec<String> = store
            .find_all(&RuleQuery::all())
            .await
            .expect("list")
            .into_iter()
            .filter_map(|r| r.identifier.layer)
            .collect();
        assert_eq!(layers, vec!["a", "new", "b", "c"]);
    }

    #[tokio::test]
    async fn relative_insert_positions() {
        let store = store_with(vec![
            Rule::allow().with_priority(10).with_layer("a"),
            Rule::allow().with_priority(20).with_layer("b"),
        ])
        .await;
        let last = store
            .create(Rule::allow().with_priority(0).with_layer("c"), InsertPosition::FromEnd)
            .await
            .expect("append");
        assert_eq!(last.priority, 21);

        let first = store
            .create(Rule::allow().with_priority(0).with_layer("d"), InsertPosition::FromStart)
            .await
            .expect("prepend");
        assert_eq!(first.priority, 10);
        assert_eq!(priorities(&store).await, vec![10, 11, 21, 22]);
    }

    #[tokio::test]
    async fn duplicate_identifiers_conflict_except_limit() {
        let store = store_with(vec![Rule::allow().with_priority(1).with_username("u")]).await;
        let err = store
            .create(Rule::allow().with_priority(2).with_username("u"), InsertPosition::Fixed)
            .await
            .expect_err("dup");
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(priorities(&store).await, vec![1]);

        // Same tuple with another grant is a different identifier.
        store
            .create(Rule::deny().with_priority(2).with_username("u"), InsertPosition::Fixed)
            .await
            .expect("deny variant");

        for priority in [3, 4] {
            store
                .create(Rule::limit().with_priority(priority).with_username("u"), InsertPosition::Fixed)
                .await
                .expect("limit rules may repeat");
        }
        assert_eq!(store.count(None).await.expect("count"), 4);
    }

    #[tokio::test]
    async fn save_moves_priority_and_rechecks_duplicates() {
        let store = store_with(vec![
            Rule::allow().with_priority(1).with_layer("a"),
            Rule::allow().with_priority(2).with_layer("b"),
            Rule::allow().with_priority(3).with_layer("c"),
        ])
        .await;
        let c = store.find_one_by_priority(3).await.expect("find").expect("c");

        let moved = store.save(c.clone().with_priority(1)).await.expect("save");
        assert_eq!(moved.priority, 1);
        let a = store.find_one_by_priority(2).await.expect("find").expect("a");
        assert_eq!(a.identifier.layer.as_deref(), Some("a"));

        let err = store
            .save(moved.clone().with_layer("b"))
            .await
            .expect_err("dup");
        assert!(matches!(err, StoreError::Conflict(_)));

        // Saving an unchanged rule is not a conflict with itself.
        store.save(moved).await.expect("self save");

        let missing = Rule::allow().with_id(RuleId::new(99)).with_priority(7);
        assert!(matches!(
            store.save(missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn shift_and_swap() {
        let store = store_with(vec![
            Rule::allow().with_priority(1).with_layer("a"),
            Rule::allow().with_priority(5).with_layer("b"),
        ])
        .await;
        assert!(matches!(
            store.shift(0, 0).await,
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.shift(100, 1).await.expect("noop"), -1);
        assert_eq!(store.shift(5, 10).await.expect("shift"), 1);
        assert_eq!(priorities(&store).await, vec![1, 15]);

        let a = store.find_one_by_priority(1).await.expect("a").expect("a");
        let b = store.find_one_by_priority(15).await.expect("b").expect("b");
        let (a_id, b_id) = (a.id.expect("id"), b.id.expect("id"));
        store.swap(a_id, b_id).await.expect("swap");
        assert_eq!(store.find_by_id(a_id).await.expect("a").map(|r| r.priority), Some(15));
        assert_eq!(store.find_by_id(b_id).await.expect("b").map(|r| r.priority), Some(1));

        assert!(matches!(
            store.swap(a_id, RuleId::new(404)).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn overflowing_priorities_are_rejected_untouched() {
        let (publisher, mut rx) = event_channel();
        let store = InMemoryRuleStore::with_publisher(Arc::new(publisher));
        for (priority, layer) in [(1, "a"), (2, "b")] {
            store
                .create(Rule::allow().with_priority(priority).with_layer(layer), InsertPosition::Fixed)
                .await
                .expect("create");
        }
        while rx.try_recv().is_ok() {}

        assert!(matches!(
            store.shift(0, i64::MAX).await,
            Err(StoreError::Validation(_))
        ));
        assert_eq!(priorities(&store).await, vec![1, 2]);
        assert!(rx.try_recv().is_err());

        store
            .create(Rule::allow().with_priority(i64::MAX).with_layer("last"), InsertPosition::Fixed)
            .await
            .expect("free top slot");
        let err = store
            .create(Rule::deny().with_priority(i64::MAX).with_layer("over"), InsertPosition::Fixed)
            .await
            .expect_err("occupied top slot");
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(priorities(&store).await, vec![1, 2, i64::MAX]);
        assert!(
            store
                .find_one_by_priority(i64::MAX)
                .await
                .expect("unique top priority")
                .is_some()
        );
    }

    #[tokio::test]
    async fn payload_setters_validate_grant_and_layer() {
        let store = store_with(vec![
            Rule::allow()
                .with_priority(1)
                .with_layer("l1")
                .with_layer_details(LayerDetails::default()),
            Rule::allow().with_priority(2),
            Rule::limit().with_priority(3),
            Rule::deny().with_priority(4).with_layer("l1"),
        ])
        .await;
        let ids: Vec<RuleId> = store
            .find_all(&RuleQuery::all())
            .await
            .expect("list")
            .iter()
            .filter_map(|r| r.id)
            .collect();
        let (allow_layer, allow_any, limit, deny) = (ids[0], ids[1], ids[2], ids[3]);

        store
            .set_allowed_styles(allow_layer, ["s1".to_string()].into_iter().collect())
            .await
            .expect("styles");
        let details = store
            .find_layer_details_by_rule_id(allow_layer)
            .await
            .expect("details")
            .expect("some");
        assert!(details.allowed_styles.contains("s1"));

        assert!(matches!(
            store.set_allowed_styles(allow_any, BTreeSet::new()).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.set_layer_details(allow_any, Some(LayerDetails::default())).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.set_layer_details(deny, Some(LayerDetails::default())).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.set_limits(allow_layer, Some(RuleLimits::default())).await,
            Err(StoreError::Validation(_))
        ));
        store
            .set_limits(limit, Some(RuleLimits::default()))
            .await
            .expect("limits");
        store.set_layer_details(allow_layer, None).await.expect("clear");
        assert_eq!(
            store.find_layer_details_by_rule_id(allow_layer).await.expect("details"),
            None
        );
        assert!(matches!(
            store.find_layer_details_by_rule_id(RuleId::new(404)).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_filters_and_pages() {
        let lan: IpAddressRange = "192.168.0.0/16".parse().expect("cidr");
        let store = store_with(vec![
            Rule::allow().with_priority(30).with_layer("l1"),
            Rule::allow().with_priority(10).with_layer("l1").with_address_range(lan),
            Rule::deny().with_priority(20).with_layer("l2"),
        ])
        .await;

        let l1 = AccessRequest::new().with_layer("l1");
        assert_eq!(store.count(Some(&l1)).await.expect("count"), 2);
        let listed = store
            .find_all(&RuleQuery::matching(l1.clone()))
            .await
            .expect("list");
        assert_eq!(listed.len(), 1, "address-bound rule needs an address");

        let from_lan = l1.clone().with_source_address("192.168.1.1");
        let listed = store
            .find_all(&RuleQuery::matching(from_lan))
            .await
            .expect("list");
        assert_eq!(listed.iter().map(|r| r.priority).collect::<Vec<_>>(), vec![10, 30]);

        let bad = l1.with_source_address("BAD");
        assert_eq!(store.count(Some(&bad)).await.expect("count"), 2);
        assert!(store.find_all(&RuleQuery::matching(bad)).await.expect("list").is_empty());

        let page = store
            .find_all(&RuleQuery::all().with_page_size(2))
            .await
            .expect("page");
        assert_eq!(page.iter().map(|r| r.priority).collect::<Vec<_>>(), vec![10, 20]);

        let cursor = store
            .find_all(&RuleQuery::all().with_next_cursor(RuleId::new(2)))
            .await
            .expect("cursor");
        assert_eq!(cursor.len(), 2);
    }

    #[tokio::test]
    async fn writes_publish_events() {
        let (publisher, mut rx) = event_channel();
        let store = InMemoryRuleStore::with_publisher(Arc::new(publisher));
        let rule = store
            .create(Rule::allow().with_priority(1), InsertPosition::Fixed)
            .await
            .expect("create");
        let id = rule.id.expect("id");
        store.save(rule.with_priority(2)).await.expect("save");
        assert!(store.delete_by_id(id).await.expect("delete"));
        assert!(!store.delete_by_id(id).await.expect("delete again"));

        let mut types = Vec::new();
        while let Ok(AclEvent::Rule(event)) = rx.try_recv() {
            assert!(event.rule_ids.contains(&id));
            types.push(event.event_type);
        }
        assert_eq!(
            types,
            vec![EventType::Created, EventType::Updated, EventType::Deleted]
        );
    }
}
