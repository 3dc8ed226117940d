mod common;

use anyhow::Result;
use axum::http::StatusCode;

use scoped_crud_api::resources::enums::{
    ACCOUNT_STATUS_ARCHIVED, ACCOUNT_TYPE_CASH, ACCOUNT_TYPE_CREDIT_CARD, ACCOUNT_TYPE_SAVINGS,
};
use scoped_crud_api::testing::{account, transaction};

// Filter pipeline end to end: query string -> compiled predicates -> owner scope -> page

#[tokio::test]
async fn page_size_policy() -> Result<()> {
    let me = common::caller();
    let app = common::app(
        (0..3).map(|i| account(&me, &format!("Account {}", i), ACCOUNT_TYPE_CASH)).collect(),
        vec![],
    )
    .await?;

    for (query, expected) in [
        ("", 20),
        ("?pageSize=", 20),
        ("?pageSize=0", 20),
        ("?pageSize=50", 50),
        ("?pageSize=12.5", 12),
        ("?pageSize=12abc", 12),
        ("?pageSize=99", 99),
        ("?pageSize=100", 100),
        ("?pageSize=150", 100),
        ("?pageSize=-5", 100),
        ("?pageSize=abc", 100),
    ] {
        let (status, body) = common::get(&app, &format!("/api/accounts{}", query), &me).await?;
        assert_eq!(status, StatusCode::OK, "query {}", query);
        assert_eq!(body["data"]["_meta"]["perPage"], expected, "query {}", query);
    }
    Ok(())
}

#[tokio::test]
async fn pages_follow_default_sort() -> Result<()> {
    let me = common::caller();
    let app = common::app(
        vec![
            account(&me, "Charlie", ACCOUNT_TYPE_CASH),
            account(&me, "Alpha", ACCOUNT_TYPE_CASH),
            account(&me, "Bravo", ACCOUNT_TYPE_CASH),
        ],
        vec![],
    )
    .await?;

    let (_, body) = common::get(&app, "/api/accounts?pageSize=2&sort=-name", &me).await?;
    let names: Vec<String> = common::items(&body)
        .iter()
        .filter_map(|a| a["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["Alpha", "Bravo"]);
    assert_eq!(body["data"]["_meta"]["pageCount"], 2);

    let (_, body) = common::get(&app, "/api/accounts?pageSize=2&page=2", &me).await?;
    assert_eq!(common::items(&body)[0]["name"], "Charlie");
    Ok(())
}

#[tokio::test]
async fn client_owner_filter_never_widens_scope() -> Result<()> {
    let me = common::caller();
    let other = common::caller();
    let app = common::app(
        vec![account(&me, "Mine", ACCOUNT_TYPE_CASH), account(&other, "Theirs", ACCOUNT_TYPE_CASH)],
        vec![],
    )
    .await?;

    for query in [
        format!("?user_id={}", other.user_id()),
        format!("?user_id%5B%5D={}&user_id%5B%5D={}", other.user_id(), me.user_id()),
        "?user_id=not-a-uuid".to_string(),
    ] {
        let (status, body) = common::get(&app, &format!("/api/accounts{}", query), &me).await?;
        assert_eq!(status, StatusCode::OK);
        let items = common::items(&body);
        assert_eq!(items.len(), 1, "query {}", query);
        assert_eq!(items[0]["name"], "Mine");
    }
    Ok(())
}

#[tokio::test]
async fn partial_match_versus_equality() -> Result<()> {
    let me = common::caller();
    let wallet = account(&me, "Wallet", ACCOUNT_TYPE_CASH);
    let app = common::app(
        vec![wallet.clone(), account(&me, "Big wallet", ACCOUNT_TYPE_SAVINGS)],
        vec![
            transaction(&me, &wallet, "Groceries", 4200),
            transaction(&me, &wallet, "Grocery delivery fee", 300),
        ],
    )
    .await?;

    // name is partial match: substring, case-sensitive
    let (_, body) = common::get(&app, "/api/accounts?name=allet", &me).await?;
    assert_eq!(common::items(&body).len(), 2);
    let (_, body) = common::get(&app, "/api/accounts?name=WALLET", &me).await?;
    assert!(common::items(&body).is_empty());

    // currency_code is plain equality
    let (_, body) = common::get(&app, "/api/accounts?currency_code=US", &me).await?;
    assert!(common::items(&body).is_empty());
    let (_, body) = common::get(&app, "/api/accounts?currency_code=USD", &me).await?;
    assert_eq!(common::items(&body).len(), 2);

    // integer equality, arrays become IN
    let (_, body) = common::get(&app, "/api/transactions?amount_cents=300", &me).await?;
    assert_eq!(common::items(&body).len(), 1);
    let (_, body) = common::get(&app, "/api/transactions?amount_cents%5B%5D=300&amount_cents%5B%5D=4200", &me).await?;
    assert_eq!(common::items(&body).len(), 2);

    // LIKE wildcards in the needle match literally
    let (_, body) = common::get(&app, "/api/transactions?description=Gro%25", &me).await?;
    assert!(common::items(&body).is_empty());
    Ok(())
}

#[tokio::test]
async fn enum_tokens_resolve_or_fail() -> Result<()> {
    let me = common::caller();
    let mut archived = account(&me, "Old card", ACCOUNT_TYPE_CREDIT_CARD);
    archived.status = ACCOUNT_STATUS_ARCHIVED;
    let app = common::app(vec![account(&me, "Wallet", ACCOUNT_TYPE_CASH), archived], vec![]).await?;

    let (_, body) = common::get(&app, "/api/accounts?type=credit_card", &me).await?;
    assert_eq!(common::items(&body).len(), 1);
    let (_, body) = common::get(&app, "/api/accounts?status=ARCHIVED", &me).await?;
    assert_eq!(common::items(&body)[0]["name"], "Old card");
    let (_, body) = common::get(&app, "/api/accounts?type%5B%5D=cash&type%5B%5D=credit_card", &me).await?;
    assert_eq!(common::items(&body).len(), 2);

    let (status, body) = common::get(&app, "/api/accounts?type=crypto", &me).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["account_type"].is_string());
    Ok(())
}

#[tokio::test]
async fn malformed_values_are_rejected() -> Result<()> {
    let me = common::caller();
    let app = common::app(vec![], vec![]).await?;

    for query in ["amount_cents=lots", "account_id=not-a-uuid", "occurred_at=yesterday"] {
        let (status, _) = common::get(&app, &format!("/api/transactions?{}", query), &me).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {}", query);
    }
    Ok(())
}

#[tokio::test]
async fn relation_filters_join_only_declared_relations() -> Result<()> {
    let me = common::caller();
    let cash = account(&me, "Wallet", ACCOUNT_TYPE_CASH);
    let card = account(&me, "Visa", ACCOUNT_TYPE_CREDIT_CARD);
    let app = common::app(
        vec![cash.clone(), card.clone()],
        vec![transaction(&me, &cash, "Coffee", 350), transaction(&me, &card, "Flights", 42000)],
    )
    .await?;

    let (_, body) = common::get(&app, "/api/transactions?account.name=Vis", &me).await?;
    let items = common::items(&body);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["description"], "Flights");

    let (_, body) = common::get(&app, "/api/transactions?account.type=cash", &me).await?;
    assert_eq!(common::items(&body)[0]["description"], "Coffee");

    // undeclared relation, undeclared relation attribute, deeper nesting: all ignored
    for query in ["owner.name=x", "account.balance_cents=1", "account.name.first=x"] {
        let (status, body) = common::get(&app, &format!("/api/transactions?{}", query), &me).await?;
        assert_eq!(status, StatusCode::OK, "query {}", query);
        assert_eq!(common::items(&body).len(), 2, "query {}", query);
    }
    Ok(())
}

#[tokio::test]
async fn blank_and_unknown_parameters_are_ignored() -> Result<()> {
    let me = common::caller();
    let app = common::app(vec![account(&me, "Wallet", ACCOUNT_TYPE_CASH)], vec![]).await?;

    let (status, body) = common::get(&app, "/api/accounts?name=&type=&color=blue&sort=name", &me).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(common::items(&body).len(), 1);
    Ok(())
}
