//! End-to-end tests of the services over the in-memory store.
//!
//! Verifies:
//! - Sales move stock through the ledger and alerts follow after commit
//! - A failing operation leaves no trace
//! - Regeneration is idempotent and never touches resolved alerts
//! - Batch passes isolate restaurant failures

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration as StdDuration, Instant};

    use chrono::{DateTime, Duration, NaiveDate, Utc};

    use larder_core::{ForecastId, IngredientId, OrganizationId, ProductId, RestaurantId};
    use larder_events::{EventEnvelope, InMemoryEventBus};
    use larder_inventory::{Ingredient, InventoryRecord, Unit};
    use larder_planning::{
        AlertType, Forecast, ForecastMethod, PlannedStaffing, RecommendationData,
        RecommendationStatus, Severity,
    };
    use larder_products::{Product, Recipe, RecipeLine};
    use larder_sales::{LedgerEvent, NewSale, SalePatch};

    use crate::config::CoreConfig;
    use crate::error::ServiceError;
    use crate::hooks::{NoopHook, PostCommitHook, PublishHook, RecordingHook};
    use crate::services::{AlertService, Services};
    use crate::store::{
        AlertStore, CatalogStore, ForecastStore, InMemoryStore, InventoryStore, Restaurant,
        SalesStore,
    };
    use crate::workers::AlertWorker;

    /// A hook whose downstream is always unavailable.
    struct FailingHook;

    impl PostCommitHook for FailingHook {
        fn after_commit(&self, _event: &LedgerEvent) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("alert pipeline unavailable"))
        }
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        services: Services<InMemoryStore>,
        org: OrganizationId,
        restaurant: Restaurant,
        flour: Ingredient,
        bread: Product,
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn flour(org: OrganizationId) -> Ingredient {
        Ingredient {
            id: IngredientId::new(),
            organization_id: org,
            name: "Farine T55".to_string(),
            unit: Unit::Gram,
            cost_per_unit: 0.002,
            pack_size: None,
            supplier: Some("Moulins Bourgeois".to_string()),
        }
    }

    fn product(org: OrganizationId, name: &str, lines: Vec<RecipeLine>) -> Product {
        Product {
            id: ProductId::new(),
            organization_id: org,
            name: name.to_string(),
            category: "boulangerie".to_string(),
            unit_price: 1.2,
            recipe: Recipe::new(lines).unwrap(),
        }
    }

    fn line(ingredient_id: IngredientId, quantity_needed: f64, unit: Option<Unit>) -> RecipeLine {
        RecipeLine {
            ingredient_id,
            quantity_needed,
            unit,
        }
    }

    fn fixture_with(services: impl FnOnce(Arc<InMemoryStore>) -> Services<InMemoryStore>) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let services = services(store.clone());
        let org = OrganizationId::new();

        let restaurant = services.catalog.create_restaurant(org, "Oberkampf").unwrap();
        let flour = services.catalog.upsert_ingredient(org, flour(org)).unwrap();
        let bread = services
            .catalog
            .upsert_product(org, product(org, "Baguette", vec![line(flour.id, 150.0, None)]))
            .unwrap();
        services
            .inventory
            .create_record(org, restaurant.id, flour.id, 1000.0, 500.0, None)
            .unwrap();

        Fixture {
            store,
            services,
            org,
            restaurant,
            flour,
            bread,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(|store| Services::new(store, CoreConfig::default()))
    }

    fn sale_of(f: &Fixture, product_id: ProductId, quantity: u32, day: NaiveDate, hour: u8) -> NewSale {
        NewSale {
            restaurant_id: f.restaurant.id,
            product_id,
            quantity,
            amount: 1.2 * f64::from(quantity),
            sale_date: day,
            sale_hour: hour,
        }
    }

    fn stock(f: &Fixture, ingredient_id: IngredientId) -> Option<f64> {
        f.store
            .inventory_records(f.restaurant.id)
            .unwrap()
            .into_iter()
            .find(|r| r.ingredient_id == ingredient_id)
            .map(|r| r.current_stock)
    }

    fn unresolved(f: &Fixture) -> Vec<(AlertType, Severity, String)> {
        let mut out: Vec<_> = f
            .store
            .alerts(f.restaurant.id, false)
            .unwrap()
            .into_iter()
            .map(|a| (a.alert_type, a.severity, a.message))
            .collect();
        out.sort_by(|a, b| a.2.cmp(&b.2));
        out
    }

    #[test]
    fn flour_scenario_moves_stock_and_raises_a_shortage() {
        let f = fixture();
        let today = now().date_naive();

        let sale = f
            .services
            .sales
            .record_sale(f.org, sale_of(&f, f.bread.id, 2, today, 12))
            .unwrap();
        assert_eq!(stock(&f, f.flour.id), Some(700.0));
        assert!(unresolved(&f).is_empty());

        f.services
            .sales
            .update_sale(
                f.org,
                sale.id,
                SalePatch {
                    quantity: Some(6),
                    ..SalePatch::default()
                },
            )
            .unwrap();
        assert_eq!(stock(&f, f.flour.id), Some(100.0));

        let alerts = unresolved(&f);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, AlertType::Shortage);
        assert_eq!(alerts[0].1, Severity::High);
        assert!(alerts[0].2.contains("Farine T55"));
    }

    #[test]
    fn regeneration_is_idempotent() {
        let f = fixture();
        let today = now().date_naive();
        f.services
            .sales
            .record_sale(f.org, sale_of(&f, f.bread.id, 6, today, 9))
            .unwrap();

        let first = unresolved(&f);
        f.services.alerts.regenerate_alerts(f.org, f.restaurant.id).unwrap();
        f.services.alerts.regenerate_alerts(f.org, f.restaurant.id).unwrap();

        assert_eq!(unresolved(&f), first);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn resolved_alerts_survive_regeneration() {
        let f = fixture();
        let today = now().date_naive();
        f.services
            .sales
            .record_sale(f.org, sale_of(&f, f.bread.id, 6, today, 9))
            .unwrap();

        let alert = f.store.alerts(f.restaurant.id, false).unwrap().remove(0);
        let resolved = f.services.alerts.resolve_alert(f.org, alert.id).unwrap();
        assert!(resolved.resolved);
        assert!(resolved.resolved_at.is_some());

        f.services.alerts.regenerate_alerts(f.org, f.restaurant.id).unwrap();

        let all = f.store.alerts(f.restaurant.id, true).unwrap();
        let kept = all.iter().find(|a| a.id == alert.id).unwrap();
        assert!(kept.resolved);
        assert_eq!(kept.resolved_at, resolved.resolved_at);
        // The condition still holds, so a fresh unresolved alert exists too.
        assert_eq!(unresolved(&f).len(), 1);

        let again = f.services.alerts.resolve_alert(f.org, alert.id);
        assert!(matches!(again, Err(ServiceError::Conflict(_))));
    }

    #[test]
    fn deleting_a_sale_of_a_product_without_recipe_only_removes_the_sale() {
        let f = fixture();
        let coffee = f
            .services
            .catalog
            .upsert_product(f.org, product(f.org, "Café", vec![]))
            .unwrap();
        let today = now().date_naive();

        let sale = f
            .services
            .sales
            .record_sale(f.org, sale_of(&f, coffee.id, 3, today, 8))
            .unwrap();
        assert_eq!(stock(&f, f.flour.id), Some(1000.0));

        f.services.sales.delete_sale(f.org, sale.id).unwrap();
        assert_eq!(stock(&f, f.flour.id), Some(1000.0));
        assert!(matches!(
            f.services.sales.sale(f.org, sale.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn untracked_ingredients_are_skipped() {
        let f = fixture();
        let sugar = f
            .services
            .catalog
            .upsert_ingredient(
                f.org,
                Ingredient {
                    name: "Sucre".to_string(),
                    ..flour(f.org)
                },
            )
            .unwrap();
        let brioche = f
            .services
            .catalog
            .upsert_product(
                f.org,
                product(
                    f.org,
                    "Brioche",
                    vec![line(f.flour.id, 100.0, None), line(sugar.id, 0.05, Some(Unit::Kilogram))],
                ),
            )
            .unwrap();

        let sale = f
            .services
            .sales
            .record_sale(f.org, sale_of(&f, brioche.id, 2, now().date_naive(), 10))
            .unwrap();

        assert_eq!(stock(&f, f.flour.id), Some(800.0));
        assert_eq!(stock(&f, sugar.id), None);
        assert!(f.store.sale(sale.id).unwrap().is_some());
    }

    #[test]
    fn incompatible_units_abort_without_a_trace() {
        let f = fixture();
        // Stored directly: the catalog service would reject this recipe.
        let broken = product(f.org, "Pain liquide", vec![line(f.flour.id, 0.2, Some(Unit::Liter))]);
        f.store.upsert_product(broken.clone()).unwrap();
        let today = now().date_naive();

        let err = f
            .services
            .sales
            .record_sale(f.org, sale_of(&f, broken.id, 1, today, 12))
            .unwrap_err();
        assert!(matches!(err, ServiceError::IncompatibleUnit(_)));
        assert!(
            f.store
                .sales_between(f.restaurant.id, today, today + Duration::days(1))
                .unwrap()
                .is_empty()
        );
        assert_eq!(stock(&f, f.flour.id), Some(1000.0));

        // Switching an existing sale to the broken product rolls back too.
        let sale = f
            .services
            .sales
            .record_sale(f.org, sale_of(&f, f.bread.id, 2, today, 12))
            .unwrap();
        let err = f
            .services
            .sales
            .update_sale(
                f.org,
                sale.id,
                SalePatch {
                    product_id: Some(broken.id),
                    ..SalePatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::IncompatibleUnit(_)));
        assert_eq!(f.store.sale(sale.id).unwrap().map(|s| s.product_id), Some(f.bread.id));
        assert_eq!(stock(&f, f.flour.id), Some(700.0));
    }

    #[test]
    fn catalog_rejects_recipes_with_unconvertible_units() {
        let f = fixture();
        let err = f
            .services
            .catalog
            .upsert_product(f.org, product(f.org, "Pain liquide", vec![line(f.flour.id, 0.2, Some(Unit::Liter))]))
            .unwrap_err();
        assert!(matches!(err, ServiceError::IncompatibleUnit(_)));
    }

    #[test]
    fn other_organizations_cannot_see_or_touch_a_restaurant() {
        let f = fixture();
        let stranger = OrganizationId::new();

        let err = f
            .services
            .sales
            .record_sale(stranger, sale_of(&f, f.bread.id, 1, now().date_naive(), 12))
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(matches!(
            f.services.alerts.regenerate_alerts(stranger, f.restaurant.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn accepting_an_order_restocks_once() {
        let f = fixture();
        let at = now();
        let today = at.date_naive();
        f.store
            .upsert_forecast(Forecast {
                id: ForecastId::new(),
                restaurant_id: f.restaurant.id,
                product_id: f.bread.id,
                forecast_date: today,
                forecasted_quantity: 10,
                method: ForecastMethod::MovingAverage,
                confidence: 0.6,
                generated_at: at,
            })
            .unwrap();

        let rec = f
            .services
            .orders
            .generate_order_recommendations_at(f.org, f.restaurant.id, Some(0.1), Some(7), at)
            .unwrap()
            .expect("an order is needed");
        let RecommendationData::Order(details) = &rec.data else {
            panic!("expected an order payload");
        };
        assert_eq!(details.lines.len(), 1);
        // 10/day * 7 days * 150 g = 10500 g, +10% shrink, minus 1000 g in stock.
        let to_order = details.lines[0].to_order;
        assert!((to_order - 10_550.0).abs() < 1e-6);

        let accepted = f.services.recommendations.accept(f.org, rec.id).unwrap();
        assert_eq!(accepted.status, RecommendationStatus::Accepted);
        assert!((stock(&f, f.flour.id).unwrap() - 11_550.0).abs() < 1e-6);

        assert!(matches!(
            f.services.recommendations.accept(f.org, rec.id),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            f.services.recommendations.dismiss(f.org, rec.id),
            Err(ServiceError::Conflict(_))
        ));
        assert!((stock(&f, f.flour.id).unwrap() - 11_550.0).abs() < 1e-6);
    }

    #[test]
    fn no_demand_means_no_order_recommendation() {
        let f = fixture();
        let rec = f
            .services
            .orders
            .generate_order_recommendations(f.org, f.restaurant.id, None, None)
            .unwrap();
        assert!(rec.is_none());
        assert!(
            f.services
                .recommendations
                .list(f.org, f.restaurant.id)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn planned_headcount_above_recommendation_is_overstaffing() {
        let f = fixture();
        let coffee = f
            .services
            .catalog
            .upsert_product(f.org, product(f.org, "Café", vec![]))
            .unwrap();
        let at = now();
        let today = at.date_naive();
        for days_ago in 1..=3 {
            f.services
                .sales
                .record_sale(f.org, sale_of(&f, coffee.id, 40, today - Duration::days(days_ago), 12))
                .unwrap();
        }

        let tomorrow = today + Duration::days(1);
        let rec = f
            .services
            .staffing
            .generate_staffing_recommendations_at(f.org, f.restaurant.id, tomorrow, at)
            .unwrap()
            .expect("the lunch slot has history");
        let RecommendationData::Staffing(plan) = &rec.data else {
            panic!("expected a staffing payload");
        };
        assert_eq!(plan.slots.len(), 1);
        assert_eq!(plan.slots[0].recommended_staff, 2);

        f.services
            .catalog
            .plan_staffing(
                f.org,
                PlannedStaffing {
                    restaurant_id: f.restaurant.id,
                    plan_date: tomorrow,
                    slot_label: "12:00-14:00".to_string(),
                    planned_count: 5,
                },
            )
            .unwrap();
        f.services
            .alerts
            .regenerate_alerts_at(f.org, f.restaurant.id, at)
            .unwrap();

        let alerts = unresolved(&f);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, AlertType::Overstaffing);
        assert_eq!(alerts[0].1, Severity::High);
    }

    #[test]
    fn tomorrows_forecast_exposes_a_shortfall() {
        let f = fixture();
        let at = now();
        let tomorrow = at.date_naive() + Duration::days(1);
        f.store
            .upsert_forecast(Forecast {
                id: ForecastId::new(),
                restaurant_id: f.restaurant.id,
                product_id: f.bread.id,
                forecast_date: tomorrow,
                forecasted_quantity: 10,
                method: ForecastMethod::MovingAverage,
                confidence: 0.4,
                generated_at: at,
            })
            .unwrap();

        f.services
            .alerts
            .regenerate_alerts_at(f.org, f.restaurant.id, at)
            .unwrap();

        // Need 1500 g against 1000 g: shortfall 500 is not above twice the minimum.
        let alerts = unresolved(&f);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, AlertType::Shortage);
        assert_eq!(alerts[0].1, Severity::High);
        assert!(alerts[0].2.contains("demain"));
    }

    #[test]
    fn forecasts_are_computed_from_recorded_sales() {
        let f = fixture();
        let today = now().date_naive();
        for days_ago in 1..=7 {
            f.services
                .sales
                .record_sale(f.org, sale_of(&f, f.bread.id, 1, today - Duration::days(days_ago), 11))
                .unwrap();
        }

        let stored = f
            .services
            .forecasts
            .run_forecast(f.org, f.restaurant.id, f.bread.id, today, ForecastMethod::MovingAverage)
            .unwrap();
        assert_eq!(stored.forecasted_quantity, 1);

        let again = f
            .services
            .forecasts
            .run_forecast(f.org, f.restaurant.id, f.bread.id, today, ForecastMethod::MovingAverage)
            .unwrap();
        assert_eq!(again.id, stored.id);
        assert_eq!(
            f.services
                .forecasts
                .get_forecast(f.org, f.restaurant.id, f.bread.id, today)
                .unwrap()
                .map(|fc| fc.id),
            Some(stored.id)
        );
    }

    #[test]
    fn a_failing_restaurant_does_not_stop_the_batch() {
        let f = fixture_with(|store| Services::with_hook(store, CoreConfig::default(), Arc::new(NoopHook)));
        let second = f.services.catalog.create_restaurant(f.org, "Batignolles").unwrap();
        f.services
            .inventory
            .create_record(f.org, second.id, f.flour.id, 10.0, 500.0, None)
            .unwrap();

        // Only the first restaurant has demand for the unconvertible recipe.
        let broken = product(f.org, "Pain liquide", vec![line(f.flour.id, 0.2, Some(Unit::Liter))]);
        f.store.upsert_product(broken.clone()).unwrap();
        let at = now();
        for (restaurant_id, product_id) in [(f.restaurant.id, broken.id), (second.id, f.bread.id)] {
            f.store
                .upsert_forecast(Forecast {
                    id: ForecastId::new(),
                    restaurant_id,
                    product_id,
                    forecast_date: at.date_naive(),
                    forecasted_quantity: 10,
                    method: ForecastMethod::MovingAverage,
                    confidence: 0.5,
                    generated_at: at,
                })
                .unwrap();
        }

        let orders = f
            .services
            .orders
            .generate_for_all_restaurants(f.org, None, None)
            .unwrap();
        assert_eq!(orders.failed.len(), 1);
        assert_eq!(orders.failed[0].0, f.restaurant.id);
        assert_eq!(orders.succeeded.len(), 1);
        assert_eq!(orders.succeeded[0].0, second.id);
        assert!(orders.succeeded[0].1.is_some());

        let alerts = f.services.alerts.regenerate_all(f.org).unwrap();
        assert!(alerts.is_complete());
        let per_restaurant: std::collections::HashMap<RestaurantId, usize> =
            alerts.succeeded.into_iter().collect();
        assert_eq!(per_restaurant.get(&f.restaurant.id), Some(&0));
        assert_eq!(per_restaurant.get(&second.id), Some(&1));
    }

    #[test]
    fn post_commit_events_are_reported_after_each_mutation() {
        let hook = Arc::new(RecordingHook::new());
        let hook_for_services = hook.clone();
        let f = fixture_with(move |store| {
            Services::with_hook(store, CoreConfig::default(), hook_for_services)
        });
        let today = now().date_naive();

        let sale = f
            .services
            .sales
            .record_sale(f.org, sale_of(&f, f.bread.id, 1, today, 12))
            .unwrap();
        f.services
            .sales
            .update_sale(
                f.org,
                sale.id,
                SalePatch {
                    sale_hour: Some(13),
                    ..SalePatch::default()
                },
            )
            .unwrap();
        f.services.sales.delete_sale(f.org, sale.id).unwrap();

        let events = hook.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], LedgerEvent::SaleRecorded(_)));
        match &events[1] {
            LedgerEvent::SaleUpdated(e) => assert!(!e.stock_changed),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(events[2], LedgerEvent::SaleDeleted(_)));
        assert_eq!(stock(&f, f.flour.id), Some(1000.0));
    }

    #[test]
    fn mutations_commit_even_when_the_post_commit_hook_fails() {
        let f = fixture_with(|store| {
            Services::with_hook(store, CoreConfig::default(), Arc::new(FailingHook))
        });
        let at = now();
        let today = at.date_naive();

        let sale = f
            .services
            .sales
            .record_sale(f.org, sale_of(&f, f.bread.id, 2, today, 12))
            .unwrap();
        assert_eq!(stock(&f, f.flour.id), Some(700.0));
        assert!(f.store.sale(sale.id).unwrap().is_some());

        let updated = f
            .services
            .sales
            .update_sale(
                f.org,
                sale.id,
                SalePatch {
                    quantity: Some(6),
                    ..SalePatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.quantity, 6);
        assert_eq!(stock(&f, f.flour.id), Some(100.0));
        assert_eq!(f.store.sale(sale.id).unwrap().map(|s| s.quantity), Some(6));

        let adjusted = f
            .services
            .inventory
            .adjust_stock(f.org, f.restaurant.id, f.flour.id, 50.0)
            .unwrap();
        assert_eq!(adjusted.current_stock, 150.0);
        assert_eq!(stock(&f, f.flour.id), Some(150.0));

        f.services.sales.delete_sale(f.org, sale.id).unwrap();
        assert_eq!(stock(&f, f.flour.id), Some(1050.0));
        assert!(f.store.sale(sale.id).unwrap().is_none());

        f.store
            .upsert_forecast(Forecast {
                id: ForecastId::new(),
                restaurant_id: f.restaurant.id,
                product_id: f.bread.id,
                forecast_date: today,
                forecasted_quantity: 10,
                method: ForecastMethod::MovingAverage,
                confidence: 0.6,
                generated_at: at,
            })
            .unwrap();
        let rec = f
            .services
            .orders
            .generate_order_recommendations_at(f.org, f.restaurant.id, Some(0.1), Some(7), at)
            .unwrap()
            .expect("an order is needed");
        let accepted = f.services.recommendations.accept(f.org, rec.id).unwrap();
        assert_eq!(accepted.status, RecommendationStatus::Accepted);
        // 10500 g +10% shrink, minus the 1050 g on hand, restocked on top of it.
        assert!((stock(&f, f.flour.id).unwrap() - 11_550.0).abs() < 1e-6);
        let stored = f.services.recommendations.list(f.org, f.restaurant.id).unwrap();
        assert_eq!(stored[0].status, RecommendationStatus::Accepted);

        // The hook never ran, so nothing refreshed the alerts.
        assert!(unresolved(&f).is_empty());
    }

    #[test]
    fn alert_worker_refreshes_alerts_from_published_events() {
        let bus: Arc<InMemoryEventBus<EventEnvelope<LedgerEvent>>> = Arc::new(InMemoryEventBus::new());
        let bus_for_hook = bus.clone();
        let f = fixture_with(move |store| {
            Services::with_hook(store, CoreConfig::default(), Arc::new(PublishHook::new(bus_for_hook)))
        });
        let worker = AlertWorker::spawn(
            "test-alert-worker",
            bus.clone(),
            Some(f.org),
            AlertService::new(f.store.clone(), &CoreConfig::default()),
        );

        f.services
            .sales
            .record_sale(f.org, sale_of(&f, f.bread.id, 6, now().date_naive(), 12))
            .unwrap();

        let deadline = Instant::now() + StdDuration::from_secs(5);
        while unresolved(&f).is_empty() && Instant::now() < deadline {
            thread::sleep(StdDuration::from_millis(20));
        }
        worker.shutdown();

        let alerts = unresolved(&f);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, AlertType::Shortage);
    }

    #[test]
    fn adjusting_an_untracked_record_is_not_found() {
        let f = fixture();
        let err = f
            .services
            .inventory
            .adjust_stock(f.org, f.restaurant.id, IngredientId::new(), 5.0)
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let record: InventoryRecord = f
            .services
            .inventory
            .adjust_stock(f.org, f.restaurant.id, f.flour.id, -950.0)
            .unwrap();
        assert_eq!(record.current_stock, 50.0);
        // 50/500 is below a fifth of the minimum.
        assert_eq!(unresolved(&f)[0].1, Severity::Critical);
    }

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Record { product: usize, quantity: u32 },
            Update { sale: usize, product: Option<usize>, quantity: Option<u32> },
            Delete { sale: usize },
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0usize..2, 1u32..20).prop_map(|(product, quantity)| Op::Record { product, quantity }),
                (0usize..8, proptest::option::of(0usize..2), proptest::option::of(1u32..20))
                    .prop_map(|(sale, product, quantity)| Op::Update { sale, product, quantity }),
                (0usize..8).prop_map(|sale| Op::Delete { sale }),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

            #[test]
            fn stock_reflects_exactly_the_recorded_sales(ops in proptest::collection::vec(op(), 1..16)) {
                let f = fixture_with(|store| {
                    Services::with_hook(store, CoreConfig::default(), Arc::new(NoopHook))
                });
                let roll = f
                    .services
                    .catalog
                    .upsert_product(f.org, product(f.org, "Pain au lait", vec![line(f.flour.id, 0.04, Some(Unit::Kilogram))]))
                    .unwrap();
                let products = [(f.bread.id, 150.0), (roll.id, 40.0)];
                let today = now().date_naive();
                let mut live = Vec::new();

                for op in ops {
                    match op {
                        Op::Record { product, quantity } => {
                            let sale = f
                                .services
                                .sales
                                .record_sale(f.org, sale_of(&f, products[product].0, quantity, today, 12))
                                .unwrap();
                            live.push(sale.id);
                        }
                        Op::Update { sale, product, quantity } if !live.is_empty() => {
                            let id = live[sale % live.len()];
                            let patch = SalePatch {
                                product_id: product.map(|p| products[p].0),
                                quantity,
                                ..SalePatch::default()
                            };
                            f.services.sales.update_sale(f.org, id, patch).unwrap();
                        }
                        Op::Delete { sale } if !live.is_empty() => {
                            let id = live.remove(sale % live.len());
                            f.services.sales.delete_sale(f.org, id).unwrap();
                        }
                        _ => {}
                    }
                }

                let consumed: f64 = live
                    .iter()
                    .map(|id| {
                        let sale = f.store.sale(*id).unwrap().unwrap();
                        let per_unit = products
                            .iter()
                            .find(|(p, _)| *p == sale.product_id)
                            .map(|(_, g)| *g)
                            .unwrap();
                        f64::from(sale.quantity) * per_unit
                    })
                    .sum();
                let actual = stock(&f, f.flour.id).unwrap();
                prop_assert!((actual - (1000.0 - consumed)).abs() < 1e-6);
            }
        }
    }
}
