//! Macro-generated contract suite for the store traits.
//!
//! `store_contract_tests!` validates a full set of [`Stores`] against the
//! behaviour handlers rely on: uniqueness, partial updates, all-or-nothing
//! order placement, idempotent replays, restocking and cascades.
//!
//! # Generated Tests
//!
//! ## Users
//! - `test_user_roundtrip`: create, get, find by email, list
//! - `test_user_email_is_unique`: duplicate create and clashing update fail
//! - `test_user_delete`: delete then get returns None
//!
//! ## Products
//! - `test_product_filters`: category, search, price and stock filters
//! - `test_product_sort_and_paging`: sort by price, page boundaries
//! - `test_product_partial_update`: untouched fields survive
//! - `test_product_images`: add then remove an image
//! - `test_product_categories`: counts per category
//! - `test_missing_product_operations`: NotFound everywhere
//!
//! ## Orders
//! - `test_place_order_decrements_stock`
//! - `test_shortfall_is_all_or_nothing`
//! - `test_idempotent_replay`
//! - `test_cancel_restocks_once`
//! - `test_expected_status_guard`
//! - `test_list_orders`
//! - `test_concurrent_orders_never_oversell`
//!
//! ## Favorites
//! - `test_favorites_unique_and_cascade`
//!
//! [`Stores`]: storefront::core::Stores

/// Generate the store contract suite.
///
/// `$factory` must evaluate to a fresh, empty [`Stores`]; it is re-evaluated
/// for each test and may contain `.await`.
///
/// [`Stores`]: storefront::core::Stores
#[macro_export]
macro_rules! store_contract_tests {
    ($factory:expr) => {
        mod store_contract_tests {
            use super::*;
            use storefront::catalog::model::UpdateProductRequest;
            use storefront::core::{ProductQuery, Stores};
            use storefront::favorites::model::Favorite;
            use storefront::orders::OrderStatus;
            use uuid::Uuid;

            async fn seed_product(stores: &Stores, name: &str, stock: u32) -> Uuid {
                stores
                    .products
                    .create(product(name, "general", 1000, stock))
                    .await
                    .unwrap()
                    .id
            }

            async fn stock(stores: &Stores, id: &Uuid) -> u32 {
                stores.products.get(id).await.unwrap().unwrap().stock
            }

            // ==================================================================
            // Users
            // ==================================================================

            #[tokio::test]
            async fn test_user_roundtrip() {
                let stores: Stores = $factory;
                let created = stores
                    .users
                    .create(user("Alice", "Alice@Example.com"))
                    .await
                    .unwrap();

                let fetched = stores.users.get(&created.id).await.unwrap().unwrap();
                assert_eq!(fetched.email, "alice@example.com");

                let by_email = stores
                    .users
                    .find_by_email("alice@example.com")
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(by_email.id, created.id);

                assert!(stores.users.get(&Uuid::new_v4()).await.unwrap().is_none());
                assert_eq!(stores.users.list().await.unwrap().len(), 1);
            }

            #[tokio::test]
            async fn test_user_email_is_unique() {
                let stores: Stores = $factory;
                stores.users.create(user("Bob", "bob@example.com")).await.unwrap();

                let err = stores
                    .users
                    .create(user("Bobby", "BOB@example.com"))
                    .await
                    .unwrap_err();
                assert_eq!(err.error_code(), "ENTITY_ALREADY_EXISTS");

                let mut carol = stores
                    .users
                    .create(user("Carol", "carol@example.com"))
                    .await
                    .unwrap();
                carol.email = "bob@example.com".to_string();
                let err = stores.users.update(carol).await.unwrap_err();
                assert_eq!(err.error_code(), "ENTITY_ALREADY_EXISTS");
            }

            #[tokio::test]
            async fn test_user_delete() {
                let stores: Stores = $factory;
                let dan = stores.users.create(user("Dan", "dan@example.com")).await.unwrap();

                stores.users.delete(&dan.id).await.unwrap();
                assert!(stores.users.get(&dan.id).await.unwrap().is_none());
                assert!(stores.users.delete(&dan.id).await.is_err());
            }

            // ==================================================================
            // Products
            // ==================================================================

            #[tokio::test]
            async fn test_product_filters() {
                let stores: Stores = $factory;
                for p in [
                    product("Cheddar", "cheese", 700, 3),
                    product("Brie", "cheese", 900, 0),
                    product("Sourdough", "bread", 450, 8),
                ] {
                    stores.products.create(p).await.unwrap();
                }

                let (items, total) = stores
                    .products
                    .list(&ProductQuery {
                        category: Some("CHEESE".into()),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                assert_eq!((items.len(), total), (2, 2));

                let (items, _) = stores
                    .products
                    .list(&ProductQuery {
                        category: Some("cheese".into()),
                        in_stock: Some(true),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].name, "Cheddar");

                let (items, _) = stores
                    .products
                    .list(&ProductQuery {
                        search: Some("dough".into()),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                assert_eq!(items[0].name, "Sourdough");

                let (_, total) = stores
                    .products
                    .list(&ProductQuery {
                        min_price: Some(500),
                        max_price: Some(900),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                assert_eq!(total, 2);
            }

            #[tokio::test]
            async fn test_product_sort_and_paging() {
                let stores: Stores = $factory;
                for (i, price) in [500, 100, 400, 200, 300].into_iter().enumerate() {
                    stores
                        .products
                        .create(product(&format!("P{i}"), "misc", price, 1))
                        .await
                        .unwrap();
                }

                let (page, total) = stores
                    .products
                    .list(&ProductQuery {
                        sort: Some("price:asc".into()),
                        limit: 2,
                        page: 2,
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                assert_eq!(total, 5);
                let prices: Vec<i64> = page.iter().map(|p| p.price_cents).collect();
                assert_eq!(prices, vec![300, 400]);

                let (page, _) = stores
                    .products
                    .list(&ProductQuery {
                        sort: Some("price:desc".into()),
                        limit: 2,
                        page: 3,
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                assert_eq!(page.len(), 1);
                assert_eq!(page[0].price_cents, 100);
            }

            #[tokio::test]
            async fn test_product_partial_update() {
                let stores: Stores = $factory;
                let id = seed_product(&stores, "Mug", 4).await;

                let updated = stores
                    .products
                    .update(
                        &id,
                        UpdateProductRequest {
                            price_cents: Some(1250),
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap();
                assert_eq!(updated.price_cents, 1250);
                assert_eq!(updated.name, "Mug");
                assert_eq!(updated.stock, 4);

                let stored = stores.products.get(&id).await.unwrap().unwrap();
                assert_eq!(stored.price_cents, 1250);
            }

            #[tokio::test]
            async fn test_product_images() {
                let stores: Stores = $factory;
                let id = seed_product(&stores, "Poster", 1).await;
                let picture = image(&id);

                let with_image = stores.products.add_image(&id, picture.clone()).await.unwrap();
                assert_eq!(with_image.images, vec![picture.clone()]);

                let (without, removed) =
                    stores.products.remove_image(&id, &picture.id).await.unwrap();
                assert!(without.images.is_empty());
                assert_eq!(removed.id, picture.id);

                let err = stores
                    .products
                    .remove_image(&id, &picture.id)
                    .await
                    .unwrap_err();
                assert_eq!(err.error_code(), "ENTITY_NOT_FOUND");
            }

            #[tokio::test]
            async fn test_product_categories() {
                let stores: Stores = $factory;
                for (name, category) in [("A", "tea"), ("B", "coffee"), ("C", "tea")] {
                    stores
                        .products
                        .create(product(name, category, 100, 1))
                        .await
                        .unwrap();
                }

                let categories = stores.products.categories().await.unwrap();
                let pairs: Vec<(String, usize)> = categories
                    .into_iter()
                    .map(|c| (c.name, c.count))
                    .collect();
                assert_eq!(pairs, vec![("coffee".into(), 1), ("tea".into(), 2)]);
            }

            #[tokio::test]
            async fn test_missing_product_operations() {
                let stores: Stores = $factory;
                let ghost = Uuid::new_v4();

                assert!(stores.products.get(&ghost).await.unwrap().is_none());
                assert!(stores.products.get_many(&[ghost]).await.unwrap().is_empty());

                let errors = [
                    stores
                        .products
                        .update(&ghost, UpdateProductRequest::default())
                        .await
                        .unwrap_err(),
                    stores.products.delete(&ghost).await.unwrap_err(),
                    stores.products.add_image(&ghost, image(&ghost)).await.unwrap_err(),
                ];
                for err in errors {
                    assert_eq!(err.error_code(), "ENTITY_NOT_FOUND");
                }
            }

            // ==================================================================
            // Orders
            // ==================================================================

            #[tokio::test]
            async fn test_place_order_decrements_stock() {
                let stores: Stores = $factory;
                let a = seed_product(&stores, "A", 5).await;
                let b = seed_product(&stores, "B", 2).await;
                let customer = Uuid::new_v4();

                let placed = stores
                    .orders
                    .place_order(draft(customer, &[(a, 3), (b, 2)], None))
                    .await
                    .unwrap();

                assert!(!placed.replayed);
                assert_eq!(placed.order.status, OrderStatus::Pending);
                assert_eq!(placed.order.total_cents, 5000);
                assert_eq!(stock(&stores, &a).await, 2);
                assert_eq!(stock(&stores, &b).await, 0);

                let fetched = stores.orders.get(&placed.order.id).await.unwrap().unwrap();
                assert_eq!(fetched, placed.order);
            }

            #[tokio::test]
            async fn test_shortfall_is_all_or_nothing() {
                let stores: Stores = $factory;
                let a = seed_product(&stores, "A", 5).await;
                let b = seed_product(&stores, "B", 1).await;
                let customer = Uuid::new_v4();

                let err = stores
                    .orders
                    .place_order(draft(customer, &[(a, 2), (b, 2)], None))
                    .await
                    .unwrap_err();
                assert_eq!(err.error_code(), "INSUFFICIENT_STOCK");

                let err = stores
                    .orders
                    .place_order(draft(customer, &[(a, 1), (Uuid::new_v4(), 1)], None))
                    .await
                    .unwrap_err();
                assert_eq!(err.error_code(), "PRODUCT_UNAVAILABLE");

                assert_eq!(stock(&stores, &a).await, 5);
                assert_eq!(stock(&stores, &b).await, 1);
                assert!(stores.orders.list_for_user(&customer).await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_idempotent_replay() {
                let stores: Stores = $factory;
                let a = seed_product(&stores, "A", 5).await;
                let customer = Uuid::new_v4();

                let first = stores
                    .orders
                    .place_order(draft(customer, &[(a, 2)], Some("key-1")))
                    .await
                    .unwrap();
                let second = stores
                    .orders
                    .place_order(draft(customer, &[(a, 2)], Some("key-1")))
                    .await
                    .unwrap();

                assert!(!first.replayed);
                assert!(second.replayed);
                assert_eq!(first.order.id, second.order.id);
                assert_eq!(stock(&stores, &a).await, 3);

                // Another user may reuse the same key
                let other = stores
                    .orders
                    .place_order(draft(Uuid::new_v4(), &[(a, 1)], Some("key-1")))
                    .await
                    .unwrap();
                assert!(!other.replayed);
                assert_eq!(stock(&stores, &a).await, 2);
            }

            #[tokio::test]
            async fn test_cancel_restocks_once() {
                let stores: Stores = $factory;
                let a = seed_product(&stores, "A", 5).await;
                let placed = stores
                    .orders
                    .place_order(draft(Uuid::new_v4(), &[(a, 4)], None))
                    .await
                    .unwrap();
                assert_eq!(stock(&stores, &a).await, 1);

                let cancelled = stores
                    .orders
                    .transition(&placed.order.id, OrderStatus::Cancelled, None)
                    .await
                    .unwrap();
                assert_eq!(cancelled.status, OrderStatus::Cancelled);
                assert_eq!(stock(&stores, &a).await, 5);

                let err = stores
                    .orders
                    .transition(&placed.order.id, OrderStatus::Cancelled, None)
                    .await
                    .unwrap_err();
                assert_eq!(err.error_code(), "INVALID_STATUS_TRANSITION");
                assert_eq!(stock(&stores, &a).await, 5);
            }

            #[tokio::test]
            async fn test_expected_status_guard() {
                let stores: Stores = $factory;
                let a = seed_product(&stores, "A", 5).await;
                let placed = stores
                    .orders
                    .place_order(draft(Uuid::new_v4(), &[(a, 1)], None))
                    .await
                    .unwrap();
                let id = placed.order.id;

                stores
                    .orders
                    .transition(&id, OrderStatus::Paid, Some(OrderStatus::Pending))
                    .await
                    .unwrap();

                let err = stores
                    .orders
                    .transition(&id, OrderStatus::Cancelled, Some(OrderStatus::Pending))
                    .await
                    .unwrap_err();
                assert_eq!(err.error_code(), "INVALID_STATUS_TRANSITION");
                assert_eq!(stock(&stores, &a).await, 4);

                let err = stores
                    .orders
                    .transition(&Uuid::new_v4(), OrderStatus::Paid, None)
                    .await
                    .unwrap_err();
                assert_eq!(err.error_code(), "ENTITY_NOT_FOUND");
            }

            #[tokio::test]
            async fn test_list_orders() {
                let stores: Stores = $factory;
                let a = seed_product(&stores, "A", 10).await;
                let alice = Uuid::new_v4();
                let bob = Uuid::new_v4();

                let first = stores
                    .orders
                    .place_order(draft(alice, &[(a, 1)], None))
                    .await
                    .unwrap();
                stores
                    .orders
                    .place_order(draft(alice, &[(a, 1)], None))
                    .await
                    .unwrap();
                stores
                    .orders
                    .place_order(draft(bob, &[(a, 1)], None))
                    .await
                    .unwrap();
                stores
                    .orders
                    .transition(&first.order.id, OrderStatus::Cancelled, None)
                    .await
                    .unwrap();

                assert_eq!(stores.orders.list_for_user(&alice).await.unwrap().len(), 2);
                assert_eq!(stores.orders.list_for_user(&bob).await.unwrap().len(), 1);
                assert_eq!(stores.orders.list_all(None).await.unwrap().len(), 3);

                let cancelled = stores
                    .orders
                    .list_all(Some(OrderStatus::Cancelled))
                    .await
                    .unwrap();
                assert_eq!(cancelled.len(), 1);
                assert_eq!(cancelled[0].id, first.order.id);
            }

            #[tokio::test]
            async fn test_concurrent_orders_never_oversell() {
                let stores: Stores = $factory;
                let a = seed_product(&stores, "Limited", 5).await;

                let mut handles = Vec::new();
                for _ in 0..12 {
                    let stores = stores.clone();
                    handles.push(tokio::spawn(async move {
                        stores
                            .orders
                            .place_order(draft(Uuid::new_v4(), &[(a, 1)], None))
                            .await
                    }));
                }

                let mut placed = 0u32;
                for handle in handles {
                    match handle.await.unwrap() {
                        Ok(_) => placed += 1,
                        Err(e) => assert!(
                            matches!(e.error_code(), "INSUFFICIENT_STOCK" | "TRANSACTION_ABORTED"),
                            "unexpected error {e}"
                        ),
                    }
                }

                assert!(placed <= 5);
                assert_eq!(stock(&stores, &a).await, 5 - placed);
            }

            // ==================================================================
            // Favorites
            // ==================================================================

            #[tokio::test]
            async fn test_favorites_unique_and_cascade() {
                let stores: Stores = $factory;
                let a = seed_product(&stores, "A", 1).await;
                let b = seed_product(&stores, "B", 1).await;
                let alice = Uuid::new_v4();
                let bob = Uuid::new_v4();

                stores.favorites.add(Favorite::new(alice, a)).await.unwrap();
                stores.favorites.add(Favorite::new(alice, b)).await.unwrap();
                stores.favorites.add(Favorite::new(bob, a)).await.unwrap();

                let err = stores.favorites.add(Favorite::new(alice, a)).await.unwrap_err();
                assert_eq!(err.error_code(), "ENTITY_ALREADY_EXISTS");

                assert_eq!(stores.favorites.list_for_user(&alice).await.unwrap().len(), 2);

                assert_eq!(stores.favorites.remove_for_product(&a).await.unwrap(), 2);
                let left = stores.favorites.list_for_user(&alice).await.unwrap();
                assert_eq!(left.len(), 1);
                assert_eq!(left[0].product_id, b);

                stores.favorites.remove(&alice, &b).await.unwrap();
                let err = stores.favorites.remove(&alice, &b).await.unwrap_err();
                assert_eq!(err.error_code(), "ENTITY_NOT_FOUND");

                stores.favorites.add(Favorite::new(bob, b)).await.unwrap();
                assert_eq!(stores.favorites.remove_for_user(&bob).await.unwrap(), 1);
            }
        }
    };
}
