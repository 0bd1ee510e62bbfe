use chrono::{DateTime, Utc};

use pvz_core::PickupPointId;

use crate::{LedgerViolation, Product, ProductType, Reception, ReceptionStatus};

/// A reception together with its products, in insertion order.
///
/// This is the reception state machine:
/// - products are only accepted while the reception is in progress;
/// - only the most recently accepted product can be removed;
/// - closing happens once and is irreversible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceptionBatch {
    reception: Reception,
    products: Vec<Product>,
}

impl ReceptionBatch {
    /// Open a new reception for `pickup_point_id`, provided none of the
    /// pickup point's existing batches is still in progress.
    pub fn open_after(
        history: &[ReceptionBatch],
        pickup_point_id: PickupPointId,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerViolation> {
        if history.iter().any(|b| b.is_open()) {
            return Err(LedgerViolation::ReceptionAlreadyOpen { pickup_point_id });
        }
        Ok(Self {
            reception: Reception::open(pickup_point_id, now),
            products: Vec::new(),
        })
    }

    pub fn reception(&self) -> &Reception {
        &self.reception
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn is_open(&self) -> bool {
        self.reception.is_open()
    }

    pub fn last_product(&self) -> Option<&Product> {
        self.products.last()
    }

    /// Record a new product at the end of the batch.
    pub fn accept(
        &mut self,
        product_type: ProductType,
        now: DateTime<Utc>,
    ) -> Result<Product, LedgerViolation> {
        if !self.is_open() {
            return Err(LedgerViolation::NoActiveReception {
                pickup_point_id: self.reception.pickup_point_id,
            });
        }
        let product = Product::record(self.reception.id, product_type, now);
        self.products.push(product.clone());
        Ok(product)
    }

    /// Remove and return the most recently accepted product.
    pub fn pop_last(&mut self) -> Result<Product, LedgerViolation> {
        let pickup_point_id = self.reception.pickup_point_id;
        if !self.is_open() {
            return Err(LedgerViolation::NoActiveReception { pickup_point_id });
        }
        self.products
            .pop()
            .ok_or(LedgerViolation::NoProductToDelete { pickup_point_id })
    }

    pub fn close(&mut self, now: DateTime<Utc>) -> Result<&Reception, LedgerViolation> {
        if !self.is_open() {
            return Err(LedgerViolation::NoOpenReception {
                pickup_point_id: self.reception.pickup_point_id,
            });
        }
        self.reception.status = ReceptionStatus::Closed;
        self.reception.closed_at = Some(now);
        Ok(&self.reception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_pickup_point() -> PickupPointId {
        PickupPointId::new()
    }

    fn open_batch(pickup_point_id: PickupPointId) -> ReceptionBatch {
        ReceptionBatch::open_after(&[], pickup_point_id, Utc::now()).unwrap()
    }

    #[test]
    fn cannot_open_while_another_is_in_progress() {
        let pvz = test_pickup_point();
        let history = vec![open_batch(pvz)];

        let err = ReceptionBatch::open_after(&history, pvz, Utc::now()).unwrap_err();
        assert_eq!(err, LedgerViolation::ReceptionAlreadyOpen { pickup_point_id: pvz });
    }

    #[test]
    fn can_open_after_previous_is_closed() {
        let pvz = test_pickup_point();
        let mut first = open_batch(pvz);
        first.close(Utc::now()).unwrap();

        let second = ReceptionBatch::open_after(&[first], pvz, Utc::now()).unwrap();
        assert!(second.is_open());
    }

    #[test]
    fn close_is_irreversible() {
        let pvz = test_pickup_point();
        let mut batch = open_batch(pvz);
        let closed_at = Utc::now();

        let reception = batch.close(closed_at).unwrap();
        assert_eq!(reception.status, ReceptionStatus::Closed);
        assert_eq!(reception.closed_at, Some(closed_at));

        let err = batch.close(Utc::now()).unwrap_err();
        assert_eq!(err, LedgerViolation::NoOpenReception { pickup_point_id: pvz });
        assert_eq!(batch.reception().closed_at, Some(closed_at));
    }

    #[test]
    fn closed_batch_rejects_products() {
        let pvz = test_pickup_point();
        let mut batch = open_batch(pvz);
        batch.accept(ProductType::Shoes, Utc::now()).unwrap();
        batch.close(Utc::now()).unwrap();

        assert_eq!(
            batch.accept(ProductType::Clothes, Utc::now()).unwrap_err(),
            LedgerViolation::NoActiveReception { pickup_point_id: pvz }
        );
        assert_eq!(
            batch.pop_last().unwrap_err(),
            LedgerViolation::NoActiveReception { pickup_point_id: pvz }
        );
        assert_eq!(batch.products().len(), 1);
    }

    #[test]
    fn empty_batch_has_nothing_to_delete() {
        let pvz = test_pickup_point();
        let mut batch = open_batch(pvz);

        assert_eq!(
            batch.pop_last().unwrap_err(),
            LedgerViolation::NoProductToDelete { pickup_point_id: pvz }
        );
    }

    #[test]
    fn accepted_products_reference_the_reception() {
        let mut batch = open_batch(test_pickup_point());
        let product = batch.accept(ProductType::Electronics, Utc::now()).unwrap();

        assert_eq!(product.reception_id, batch.reception().id);
        assert_eq!(batch.last_product(), Some(&product));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Open,
        Close,
        Append(ProductType),
        Remove,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Open),
            Just(Op::Close),
            prop::sample::select(ProductType::ALL.to_vec()).prop_map(Op::Append),
            Just(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: K appends are undone by exactly K removals in reverse
        /// order, and the next removal reports nothing to delete.
        #[test]
        fn removals_undo_appends_in_reverse_order(
            types in prop::collection::vec(prop::sample::select(ProductType::ALL.to_vec()), 0..40)
        ) {
            let pvz = test_pickup_point();
            let mut batch = open_batch(pvz);

            let mut appended = Vec::with_capacity(types.len());
            for t in types {
                appended.push(batch.accept(t, Utc::now()).unwrap());
            }

            while let Some(expected) = appended.pop() {
                let removed = batch.pop_last().unwrap();
                prop_assert_eq!(removed, expected);
            }

            prop_assert_eq!(
                batch.pop_last().unwrap_err(),
                LedgerViolation::NoProductToDelete { pickup_point_id: pvz }
            );
        }

        /// Property: under any operation sequence a pickup point has at most
        /// one reception in progress, and closed receptions never change.
        #[test]
        fn at_most_one_reception_in_progress(ops in prop::collection::vec(op_strategy(), 1..60)) {
            let pvz = test_pickup_point();
            let mut history: Vec<ReceptionBatch> = Vec::new();
            let mut closed_sizes: Vec<usize> = Vec::new();

            for op in ops {
                let open_idx = history.iter().position(|b| b.is_open());
                match op {
                    Op::Open => {
                        let res = ReceptionBatch::open_after(&history, pvz, Utc::now());
                        prop_assert_eq!(res.is_ok(), open_idx.is_none());
                        if let Ok(batch) = res {
                            history.push(batch);
                        }
                    }
                    Op::Close => match open_idx {
                        Some(i) => {
                            history[i].close(Utc::now()).unwrap();
                            closed_sizes.push(history[i].products().len());
                        }
                        None => prop_assert!(history.last_mut().map_or(true, |b| b.close(Utc::now()).is_err())),
                    },
                    Op::Append(t) => match open_idx {
                        Some(i) => { history[i].accept(t, Utc::now()).unwrap(); }
                        None => prop_assert!(history.last_mut().map_or(true, |b| b.accept(t, Utc::now()).is_err())),
                    },
                    Op::Remove => {
                        if let Some(i) = open_idx {
                            let had = history[i].products().len();
                            let res = history[i].pop_last();
                            prop_assert_eq!(res.is_ok(), had > 0);
                        }
                    }
                }

                prop_assert!(history.iter().filter(|b| b.is_open()).count() <= 1);
                let sizes: Vec<usize> = history
                    .iter()
                    .filter(|b| !b.is_open())
                    .map(|b| b.products().len())
                    .collect();
                prop_assert_eq!(&sizes, &closed_sizes);
            }
        }
    }
}
