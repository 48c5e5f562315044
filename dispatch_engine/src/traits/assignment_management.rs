use chrono::{DateTime, Utc};

use crate::{
    db_types::{AssignmentId, ClaimOutcome, ClosedAssignment, DeliveryAssignment, NewAssignment, UserId},
    traits::StoreError,
};

/// The `AssignmentManagement` trait defines the behaviour for the delivery assignment records that implement the
/// broadcast and accept protocol.
#[allow(async_fn_in_trait)]
pub trait AssignmentManagement {
    /// Creates a `broadcasted` assignment and links it to its sub-order in one transaction.
    ///
    /// The link is conditional on the sub-order having no assignment yet. If another caller linked one first,
    /// nothing is written and `None` is returned.
    async fn create_assignment(&self, assignment: NewAssignment) -> Result<Option<DeliveryAssignment>, StoreError>;

    async fn fetch_assignment(&self, id: AssignmentId) -> Result<Option<DeliveryAssignment>, StoreError>;

    /// The single conditional write that decides an accept race. The assignment moves to `assigned` only if it is
    /// still `broadcasted` and the courier was one of the candidates. On success the broadcast set is cleared and
    /// the courier is recorded on the sub-order.
    async fn claim_assignment(&self, id: AssignmentId, courier_id: UserId) -> Result<ClaimOutcome, StoreError>;

    /// Open `broadcasted` offers that include the courier, oldest first.
    async fn fetch_broadcasts_for_courier(&self, courier_id: UserId) -> Result<Vec<DeliveryAssignment>, StoreError>;

    /// The courier's active assignment (`assigned`, `picked-up` or `en-route`), if any.
    async fn fetch_active_assignment_for_courier(
        &self,
        courier_id: UserId,
    ) -> Result<Option<DeliveryAssignment>, StoreError>;

    /// Completes the delivery in a single transaction: the assignment becomes `completed` and its courier is
    /// released, the sub-order becomes `delivered`, and the handoff code issued for the assignment is cleared.
    ///
    /// Conditional on the assignment still being `assigned` to `courier_id` and the sub-order still being
    /// `out-for-delivery`. Returns `None`, with nothing changed, if either no longer holds.
    async fn complete_assignment(
        &self,
        id: AssignmentId,
        courier_id: UserId,
    ) -> Result<Option<DeliveryAssignment>, StoreError>;

    /// Cancels every `broadcasted` assignment created before `cutoff`, recording `reason`, and unlinks it from its
    /// sub-order so that it can be dispatched again.
    async fn expire_broadcasts(&self, cutoff: DateTime<Utc>, reason: &str)
        -> Result<Vec<ClosedAssignment>, StoreError>;
}
