//! Catalog browsing, the home page and product reviews.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use boostedlabs_core::ProductCategory;
use boostedlabs_integration_tests::TestApp;

#[tokio::test]
async fn test_category_listings_are_newest_first() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let creatine = app.product(ProductCategory::Health, "Creatine", "29.99").await;
    app.product(ProductCategory::Merchandise, "Logo Hoodie", "55.00")
        .await;

    let health = app.get("/products/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    let names: Vec<&str> = health
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Creatine", "Whey Isolate"]);
    assert_eq!(health.body[0]["id"], creatine.id.as_i64());
    assert_eq!(health.body[1]["id"], whey.id.as_i64());
    assert_eq!(health.body[0]["category"], "Health");
    assert_eq!(health.body[0]["discounted_price"], "29.99");
    // Provider price ids stay internal
    assert!(health.body[0].get("stripe_price_id").is_none());

    let merch = app.get("/products/merchandise", None).await;
    assert_eq!(merch.body.as_array().unwrap().len(), 1);
    assert_eq!(merch.body[0]["name"], "Logo Hoodie");
}

#[tokio::test]
async fn test_product_detail_with_related_products() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    for n in 0..5 {
        app.product(ProductCategory::Health, &format!("Bar {n}"), "3.00")
            .await;
    }
    app.product(ProductCategory::Merchandise, "Logo Hoodie", "55.00")
        .await;

    let response = app.get(&format!("/products/{}", whey.id), None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Whey Isolate");
    assert!(response.body["reviews"].as_array().unwrap().is_empty());
    let related = response.body["related_products"].as_array().unwrap();
    assert_eq!(related.len(), 4);
    assert!(related.iter().all(|p| p["category"] == "Health"));
    assert!(related.iter().all(|p| p["id"] != whey.id.as_i64()));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let app = TestApp::new();

    let response = app.get("/products/9999", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.error(), "Product not found");

    let stats = app.get("/products/9999/review-stats", None).await;
    assert_eq!(stats.status, StatusCode::NOT_FOUND);

    let review = app
        .post(
            "/products/9999/reviews",
            Some(&TestApp::token(1)),
            &json!({ "rating": 5 }),
        )
        .await;
    assert_eq!(review.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_review() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;

    let response = app
        .post(
            &format!("/products/{}/reviews", whey.id),
            Some(&TestApp::token(7)),
            &json!({ "rating": "4", "comment": "Mixes well" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["rating"], 4);
    assert_eq!(response.body["comment"], "Mixes well");
    assert_eq!(response.body["user_name"], "shopper7");
    assert_eq!(response.body["user_id"], 7);

    let detail = app.get(&format!("/products/{}", whey.id), None).await;
    assert_eq!(detail.body["reviews"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_review_rating_validation() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let uri = format!("/products/{}/reviews", whey.id);
    let token = TestApp::token(1);

    let missing = app
        .post(&uri, Some(&token), &json!({ "comment": "No stars" }))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.error(), "Rating is required");

    for rating in [json!(6), json!(-1), json!("five"), json!(4.5)] {
        let response = app
            .post(&uri, Some(&token), &json!({ "rating": rating }))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "rating {rating}");
        assert_eq!(
            response.error(),
            "Rating must be an integer between 0 and 5"
        );
    }

    let anonymous = app.post(&uri, None, &json!({ "rating": 5 })).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_review_stats() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let uri = format!("/products/{}/reviews", whey.id);
    for (user, rating) in [(1, 5), (2, 4), (3, 2)] {
        app.post(&uri, Some(&TestApp::token(user)), &json!({ "rating": rating }))
            .await;
    }

    let response = app
        .get(&format!("/products/{}/review-stats", whey.id), None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total_reviews"], 3);
    assert_eq!(response.body["average_rating"], 3.7);
    assert_eq!(response.body["recommended_percentage"], 66.7);
    assert_eq!(response.body["star_counts"]["5_star"], 1);
    assert_eq!(response.body["star_counts"]["4_star"], 1);
    assert_eq!(response.body["star_counts"]["2_star"], 1);
    assert_eq!(response.body["star_counts"]["1_star"], 0);
}

#[tokio::test]
async fn test_review_stats_without_reviews() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;

    let response = app
        .get(&format!("/products/{}/review-stats", whey.id), None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total_reviews"], 0);
    assert_eq!(response.body["average_rating"], 0.0);
}

#[tokio::test]
async fn test_home_shows_best_sellers_and_best_reviews() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let bar = app.product(ProductCategory::Health, "Protein Bar", "3.00").await;
    for n in 0..4 {
        app.product(ProductCategory::Merchandise, &format!("Tee {n}"), "20.00")
            .await;
    }
    app.place_order(1, &bar, 5).await;
    app.place_order(2, &whey, 2).await;

    for (user, rating) in [(1, 3), (2, 5)] {
        app.post(
            &format!("/products/{}/reviews", whey.id),
            Some(&TestApp::token(user)),
            &json!({ "rating": rating }),
        )
        .await;
    }

    let response = app.get("/home", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let products = response.body["products"].as_array().unwrap();
    assert_eq!(products.len(), 4);
    assert_eq!(products[0]["name"], "Protein Bar");
    assert_eq!(products[0]["order_count"], 5);
    assert_eq!(products[1]["name"], "Whey Isolate");
    let reviews = response.body["reviews"].as_array().unwrap();
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0]["rating"], 5);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let live = app.get("/health", None).await;
    assert_eq!(live.status, StatusCode::OK);
    assert_eq!(live.body, "ok");

    let ready = app.get("/health/ready", None).await;
    assert_eq!(ready.status, StatusCode::OK);
}
