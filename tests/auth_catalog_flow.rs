use axum_storefront_api::{
    db::create_pool,
    dto::auth::{LoginRequest, RegisterRequest},
    dto::products::{CreateProductRequest, UpdateProductRequest},
    entity::{AuditLogs, audit_logs::Column as AuditCol, users::ActiveModel as UserActive},
    error::AppError,
    middleware::auth::AuthUser,
    models::AuditAction,
    routes::params::{Pagination, ProductQuery},
    services::{auth_service, product_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

// Integration flow: registration with its audit entry, login, and the
// admin-only catalog mutations with theirs.
#[tokio::test]
async fn register_login_and_catalog_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };
    if std::env::var("JWT_SECRET").is_err() {
        // Login signs a token; give it a secret when the env has none.
        unsafe { std::env::set_var("JWT_SECRET", "integration-test-secret") };
    }

    let state = setup_state(&database_url).await?;

    // Registration commits the user row and its audit entry together.
    let registered = auth_service::register_user(
        &state,
        None,
        RegisterRequest {
            email: "shopper@example.com".into(),
            password: "secret123".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(registered.role, "user");
    assert_eq!(
        audit_count(&state, "users", AuditAction::Create).await?,
        1
    );

    // A duplicate email is rejected and leaves no extra audit row.
    let err = auth_service::register_user(
        &state,
        None,
        RegisterRequest {
            email: "shopper@example.com".into(),
            password: "secret123".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(
        audit_count(&state, "users", AuditAction::Create).await?,
        1
    );

    let err = auth_service::register_user(
        &state,
        None,
        RegisterRequest {
            email: "not-an-email".into(),
            password: "secret123".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = auth_service::register_user(
        &state,
        None,
        RegisterRequest {
            email: "short@example.com".into(),
            password: "12345".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Login verifies the stored hash and leaves a LOGIN trail.
    let err = auth_service::login_user(
        &state,
        None,
        LoginRequest {
            email: "shopper@example.com".into(),
            password: "wrong-password".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    let login = auth_service::login_user(
        &state,
        None,
        LoginRequest {
            email: "shopper@example.com".into(),
            password: "secret123".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(login.token.starts_with("Bearer "));
    assert_eq!(audit_count(&state, "users", AuditAction::Login).await?, 1);

    // Catalog mutations are admin-only and audited in the same transaction.
    let admin_id = create_user(&state, "admin", "admin@example.com").await?;
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };
    let auth_user = AuthUser {
        user_id: registered.id,
        role: registered.role.clone(),
    };

    let err = product_service::create_product(
        &state,
        &auth_user,
        None,
        CreateProductRequest {
            name: "Contraband".into(),
            description: None,
            price: 100,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let product = product_service::create_product(
        &state,
        &auth_admin,
        None,
        CreateProductRequest {
            name: "Limited Print".into(),
            description: Some("Numbered run".into()),
            price: 7500,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(
        audit_count(&state, "products", AuditAction::Create).await?,
        1
    );

    let err = product_service::create_product(
        &state,
        &auth_admin,
        None,
        CreateProductRequest {
            name: "Refund".into(),
            description: None,
            price: -1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = product_service::update_product(
        &state,
        &auth_user,
        None,
        product.id,
        UpdateProductRequest {
            name: None,
            description: None,
            price: Some(1),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let updated = product_service::update_product(
        &state,
        &auth_admin,
        None,
        product.id,
        UpdateProductRequest {
            name: None,
            description: None,
            price: Some(8000),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.price, 8000);
    assert_eq!(updated.name, "Limited Print");
    assert_eq!(
        audit_count(&state, "products", AuditAction::Update).await?,
        1
    );

    let fetched = product_service::get_product(&state, product.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.price, 8000);

    let listed = product_service::list_products(&state, product_query(Some("limited")))
        .await?
        .data
        .unwrap();
    assert_eq!(listed.items.len(), 1);

    // Soft delete hides the product from every catalog read.
    let deleted = product_service::delete_product(&state, &auth_admin, None, product.id)
        .await?
        .data
        .unwrap();
    assert!(deleted.deleted);
    assert_eq!(
        audit_count(&state, "products", AuditAction::Delete).await?,
        1
    );

    let err = product_service::get_product(&state, product.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let listed = product_service::list_products(&state, product_query(Some("limited")))
        .await?
        .data
        .unwrap();
    assert!(listed.items.is_empty());

    // Already-deleted products are gone for further mutations too.
    let err = product_service::delete_product(&state, &auth_admin, None, product.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let err = product_service::update_product(
        &state,
        &auth_admin,
        None,
        product.id,
        UpdateProductRequest {
            name: None,
            description: None,
            price: Some(1),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

fn product_query(name: Option<&str>) -> ProductQuery {
    ProductQuery {
        pagination: Pagination::default(),
        name: name.map(str::to_string),
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE audit_logs, payments, order_items, orders, products, users CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(AppState::new(pool))
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn audit_count(state: &AppState, table: &str, action: AuditAction) -> anyhow::Result<u64> {
    Ok(AuditLogs::find()
        .filter(AuditCol::TableName.eq(table))
        .filter(AuditCol::Action.eq(action))
        .count(&state.orm)
        .await?)
}
