use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::Order;
use crate::store::{OrderRecord, RecordStore, check_commit};

/// In-process record store. Each record sits behind its dashmap shard lock
/// for the duration of a commit, which makes the version check atomic.
#[derive(Default)]
pub struct InMemoryStore {
    records: DashMap<Uuid, OrderRecord>,
    assignment_index: DashMap<Uuid, Uuid>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryStore {
    fn insert(&self, record: OrderRecord) -> Result<(), AppError> {
        let order_id = record.order.id;
        if self.records.contains_key(&order_id) {
            return Err(AppError::AssignmentConflict(format!(
                "order {order_id} already exists"
            )));
        }

        for assignment in &record.assignments {
            self.assignment_index.insert(assignment.id, order_id);
        }
        self.records.insert(order_id, record);
        Ok(())
    }

    fn load(&self, order_id: Uuid) -> Result<OrderRecord, AppError> {
        self.records
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
    }

    fn commit(&self, mut record: OrderRecord, expected_version: u64) -> Result<OrderRecord, AppError> {
        let order_id = record.order.id;
        let mut entry = self
            .records
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if entry.version != expected_version {
            return Err(AppError::AssignmentConflict(format!(
                "order {order_id} is at version {}, expected {expected_version}",
                entry.version
            )));
        }

        check_commit(&entry, &record)?;

        for assignment in &record.assignments[entry.assignments.len()..] {
            self.assignment_index.insert(assignment.id, order_id);
        }

        record.version = expected_version + 1;
        *entry = record.clone();

        Ok(record)
    }

    fn order_for_assignment(&self, assignment_id: Uuid) -> Result<Uuid, AppError> {
        self.assignment_index
            .get(&assignment_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))
    }

    fn list(&self) -> Vec<Order> {
        self.records
            .iter()
            .map(|entry| entry.value().order.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::InMemoryStore;
    use crate::error::AppError;
    use crate::models::assignment::{AssignmentStatus, DriverAssignment};
    use crate::models::coordinate::{Address, Coordinate};
    use crate::models::order::{
        Addresses, Earnings, Order, OrderStatus, PaymentStatus, Pricing, Timeline,
    };
    use crate::store::{OrderRecord, RecordStore};

    fn order() -> Order {
        let address = Address {
            location: Coordinate::new(14.5995, 120.9842),
            text: "Ermita, Manila".to_string(),
        };
        Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            driver_id: None,
            status: OrderStatus::Pending,
            pricing: Pricing::new(10_000, 1_200, 4_900, 1_500),
            earnings: Earnings {
                vendor_earnings: 8_500,
                driver_earnings: 4_900,
                platform_commission: 3_000,
            },
            addresses: Addresses {
                pickup: address.clone(),
                delivery: address,
            },
            timeline: Timeline::new(Utc::now()),
            cancellation_reason: None,
            payment_status: PaymentStatus::Paid,
            created_at: Utc::now(),
        }
    }

    fn accepted(order_id: Uuid) -> DriverAssignment {
        DriverAssignment {
            id: Uuid::new_v4(),
            order_id,
            driver_id: Uuid::new_v4(),
            assigned_at: Utc::now(),
            status: AssignmentStatus::Accepted,
            assigned_by: None,
            distance_meters: None,
        }
    }

    #[test]
    fn stale_version_is_rejected() {
        let store = InMemoryStore::new();
        let record = OrderRecord::new(order());
        let id = record.order.id;
        store.insert(record).unwrap();

        let first = store.load(id).unwrap();
        let second = store.load(id).unwrap();

        let committed = store.commit(first, 0).unwrap();
        assert_eq!(committed.version, 1);

        let err = store.commit(second, 0).unwrap_err();
        assert!(matches!(err, AppError::AssignmentConflict(_)));
    }

    #[test]
    fn commit_indexes_new_assignments() {
        let store = InMemoryStore::new();
        let record = OrderRecord::new(order());
        let id = record.order.id;
        store.insert(record).unwrap();

        let mut record = store.load(id).unwrap();
        let assignment = accepted(id);
        let assignment_id = assignment.id;
        record.assignments.push(assignment);
        store.commit(record, 0).unwrap();

        assert_eq!(store.order_for_assignment(assignment_id).unwrap(), id);
    }

    #[test]
    fn two_accepted_assignments_are_refused() {
        let store = InMemoryStore::new();
        let record = OrderRecord::new(order());
        let id = record.order.id;
        store.insert(record).unwrap();

        let mut record = store.load(id).unwrap();
        record.assignments.push(accepted(id));
        record.assignments.push(accepted(id));

        assert!(matches!(store.commit(record, 0), Err(AppError::Internal(_))));
    }

    #[test]
    fn history_cannot_be_dropped() {
        let store = InMemoryStore::new();
        let mut record = OrderRecord::new(order());
        let id = record.order.id;
        record.assignments.push(accepted(id));
        store.insert(record).unwrap();

        let mut record = store.load(id).unwrap();
        record.assignments.clear();

        assert!(matches!(store.commit(record, 0), Err(AppError::Internal(_))));
    }

    #[test]
    fn pricing_is_immutable() {
        let store = InMemoryStore::new();
        let record = OrderRecord::new(order());
        let id = record.order.id;
        store.insert(record).unwrap();

        let mut record = store.load(id).unwrap();
        record.order.pricing = Pricing::new(1, 0, 0, 0);

        assert!(matches!(store.commit(record, 0), Err(AppError::Internal(_))));
    }

    #[test]
    fn creation_time_is_immutable() {
        let store = InMemoryStore::new();
        let record = OrderRecord::new(order());
        let id = record.order.id;
        store.insert(record).unwrap();

        let mut record = store.load(id).unwrap();
        record.order.created_at = record.order.created_at + chrono::Duration::seconds(1);

        assert!(matches!(store.commit(record, 0), Err(AppError::Internal(_))));
    }
}
