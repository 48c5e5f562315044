use dispatch_engine::{
    db_types::{CourierCandidate, GeoPoint, UserId},
    traits::CourierIndex,
    StoreError,
};
use mockall::mock;

mock! {
    pub CourierIndex {}
    impl CourierIndex for CourierIndex {
        async fn couriers_within(&self, point: &GeoPoint, radius_m: f64) -> Result<Vec<CourierCandidate>, StoreError>;
        async fn busy_couriers(&self, courier_ids: &[UserId]) -> Result<Vec<UserId>, StoreError>;
    }
}
