//! Bars, memberships and invitation codes.

mod common;

use std::collections::HashSet;

use common::{
    assert_code, create_bar, engine, engine_with, fast_config, Fixture, ScriptedCodes, StuckCodes,
    CASHIER, OWNER, WAITER,
};
use maquis_core::{MovementType, Role};
use maquis_engine::{BarUpdate, ErrorCode, NewBar, NewMovement, NewProduct};

#[tokio::test]
async fn test_code_collision_is_retried() {
    let engine = engine()
        .await
        .with_code_source(ScriptedCodes::new(&["MAQUIS01", "MAQUIS01", "MAQUIS02"]));

    let first = create_bar(&engine, "owner-a", "Le Baobab").await;
    assert_eq!(first.invitation_code, "MAQUIS01");

    let second = create_bar(&engine, "owner-b", "Chez Fatou").await;
    assert_eq!(second.invitation_code, "MAQUIS02");
}

#[tokio::test]
async fn test_code_allocation_gives_up_after_max_attempts() {
    let mut config = fast_config();
    config.invitations.max_attempts = 3;
    let engine = engine_with(config)
        .await
        .with_code_source(std::sync::Arc::new(StuckCodes("SAMECODE")));

    create_bar(&engine, "owner-a", "Le Baobab").await;
    let err = engine
        .tenants()
        .create(
            "owner-b",
            NewBar {
                name: "Chez Fatou".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
    assert!(engine.tenants().list_accessible("owner-b").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redeem_joins_the_bar_holding_the_code() {
    let engine = engine().await;
    let baobab = create_bar(&engine, "owner-a", "Le Baobab").await;
    let fatou = create_bar(&engine, "owner-b", "Chez Fatou").await;
    assert_ne!(baobab.invitation_code, fatou.invitation_code);

    let typed = format!("  {}  ", fatou.invitation_code.to_lowercase());
    let member = engine.invitations().redeem(&typed, "employee").await.unwrap();
    assert_eq!(member.bar_id, fatou.id);
    assert_eq!(member.role, Role::Waiter);
    assert!(member.is_active);

    // Redeeming again changes nothing.
    let again = engine
        .invitations()
        .redeem(&fatou.invitation_code, "employee")
        .await
        .unwrap();
    assert_eq!(again.id, member.id);

    let bars = engine.tenants().list_accessible("employee").await.unwrap();
    assert_eq!(bars.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(), vec![fatou.id.as_str()]);

    assert_code(engine.invitations().redeem("ZZZZ9999", "employee").await, ErrorCode::InvalidCode);
    assert_code(engine.invitations().redeem("bad-code", "employee").await, ErrorCode::InvalidCode);
    assert_code(
        engine.invitations().redeem(&baobab.invitation_code, "owner-a").await,
        ErrorCode::Conflict,
    );
}

#[tokio::test]
async fn test_regenerated_code_replaces_the_old_one() {
    let fx = Fixture::new().await;
    let old_code = fx.bar.invitation_code.clone();

    assert_code(fx.engine.invitations().generate(&fx.bar.id, CASHIER).await, ErrorCode::Forbidden);

    let bar = fx.engine.invitations().generate(&fx.bar.id, OWNER).await.unwrap();
    assert_ne!(bar.invitation_code, old_code);
    assert_eq!(bar.invitation_code.len(), 8);

    assert_code(fx.engine.invitations().redeem(&old_code, "late").await, ErrorCode::InvalidCode);
    let member = fx
        .engine
        .invitations()
        .redeem(&bar.invitation_code, "late")
        .await
        .unwrap();
    assert_eq!(member.bar_id, fx.bar.id);
}

#[tokio::test]
async fn test_accessible_bars_have_no_duplicates() {
    let engine = engine().await;
    let zebu = create_bar(&engine, "boss", "Zébu Bar").await;
    let akwaba = create_bar(&engine, "boss", "Akwaba").await;
    let other = create_bar(&engine, "someone", "Le Palmier").await;

    // The owner also holds an owner membership in each bar they created.
    let owned = engine.tenants().list_accessible("boss").await.unwrap();
    assert_eq!(
        owned.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
        vec!["Akwaba", "Zébu Bar"]
    );

    // Working in someone else's bar as well.
    engine.invitations().redeem(&other.invitation_code, "boss").await.unwrap();
    let all = engine.tenants().list_accessible("boss").await.unwrap();
    let ids: HashSet<&str> = all.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(all.len(), 3);
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(zebu.id.as_str()));
    assert!(ids.contains(akwaba.id.as_str()));
    assert_eq!(engine.tenants().role_of("boss", &other.id).await.unwrap(), Role::Waiter);
    assert_eq!(engine.tenants().role_of("boss", &zebu.id).await.unwrap(), Role::Owner);
}

#[tokio::test]
async fn test_select_and_current_bar() {
    let engine = engine().await;
    let akwaba = create_bar(&engine, "boss", "Akwaba").await;
    let zebu = create_bar(&engine, "boss", "Zébu Bar").await;
    let stranger = create_bar(&engine, "someone", "Le Palmier").await;

    let tenants = engine.tenants();
    assert_eq!(tenants.current("boss").await.unwrap().map(|b| b.id), Some(akwaba.id.clone()));

    tenants.select("boss", &zebu.id).await.unwrap();
    assert_eq!(tenants.current("boss").await.unwrap().map(|b| b.id), Some(zebu.id.clone()));

    assert_code(tenants.select("boss", &stranger.id).await, ErrorCode::NotFound);
    assert_code(tenants.select("boss", "no-such-bar").await, ErrorCode::NotFound);
    assert_eq!(tenants.current("boss").await.unwrap().map(|b| b.id), Some(zebu.id));

    assert!(tenants.current("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_deactivated_member_loses_access() {
    let fx = Fixture::new().await;
    let tenants = fx.engine.tenants();

    let members = tenants.list_members(&fx.bar.id, OWNER).await.unwrap();
    assert_eq!(members.len(), 3);
    assert_code(tenants.list_members(&fx.bar.id, CASHIER).await, ErrorCode::Forbidden);

    assert_code(tenants.deactivate_member(&fx.bar.id, OWNER, OWNER).await, ErrorCode::ValidationError);
    assert_code(
        tenants.change_member_role(&fx.bar.id, OWNER, WAITER, Role::Owner).await,
        ErrorCode::ValidationError,
    );

    let member = tenants.deactivate_member(&fx.bar.id, OWNER, WAITER).await.unwrap();
    assert!(!member.is_active);

    assert!(tenants.list_accessible(WAITER).await.unwrap().is_empty());
    assert_code(
        fx.engine.orders().list_orders(&fx.bar.id, WAITER, &Default::default()).await,
        ErrorCode::Forbidden,
    );
    assert_code(
        fx.engine.invitations().redeem(&fx.bar.invitation_code, WAITER).await,
        ErrorCode::Conflict,
    );
}

#[tokio::test]
async fn test_owner_edits_bar_details() {
    let fx = Fixture::new().await;
    let changes = BarUpdate {
        name: Some("Maquis du Grand Carrefour".to_string()),
        phone: Some("+225 07 00 00 00".to_string()),
        ..Default::default()
    };

    assert_code(
        fx.engine.tenants().update(&fx.bar.id, CASHIER, changes.clone()).await,
        ErrorCode::Forbidden,
    );
    let bar = fx.engine.tenants().update(&fx.bar.id, OWNER, changes).await.unwrap();
    assert_eq!(bar.name, "Maquis du Grand Carrefour");
    assert_eq!(bar.phone.as_deref(), Some("+225 07 00 00 00"));
    assert_eq!(bar.invitation_code, fx.bar.invitation_code);
}

#[tokio::test]
async fn test_stock_movements_and_low_stock() {
    let fx = Fixture::new().await;
    let inventory = fx.engine.inventory();
    let beer = inventory
        .create_product(
            &fx.bar.id,
            OWNER,
            NewProduct::new("Bock 65cl", 1000, 700).initial_stock(6).low_stock_threshold(5),
        )
        .await
        .unwrap();
    assert_eq!(beer.stock_quantity, 6);
    assert!(inventory.low_stock(&fx.bar.id, OWNER).await.unwrap().is_empty());

    let movement = |movement_type, quantity| NewMovement {
        movement_type,
        quantity,
        reason: None,
        reference_id: None,
    };

    let update = inventory
        .record_movement(&beer.id, CASHIER, movement(MovementType::Out, 2))
        .await
        .unwrap();
    assert_eq!(update.product.stock_quantity, 4);
    assert_eq!(update.movement.quantity, -2);

    assert_code(
        inventory.record_movement(&beer.id, CASHIER, movement(MovementType::Out, 5)).await,
        ErrorCode::InsufficientStock,
    );
    assert_code(
        inventory.record_movement(&beer.id, CASHIER, movement(MovementType::Adjustment, -5)).await,
        ErrorCode::InsufficientStock,
    );
    assert_code(
        inventory.record_movement(&beer.id, CASHIER, movement(MovementType::Adjustment, 0)).await,
        ErrorCode::ValidationError,
    );
    assert_code(
        inventory.record_movement(&beer.id, CASHIER, movement(MovementType::In, -1)).await,
        ErrorCode::ValidationError,
    );
    assert_code(
        inventory.record_movement(&beer.id, WAITER, movement(MovementType::In, 1)).await,
        ErrorCode::Forbidden,
    );

    let low = inventory.low_stock(&fx.bar.id, OWNER).await.unwrap();
    assert_eq!(low.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec![beer.id.as_str()]);

    // Initial stock plus the one accepted movement.
    let history = inventory.movements(&beer.id, OWNER).await.unwrap();
    assert_eq!(history.len(), 2);

    inventory.deactivate_product(&beer.id, OWNER).await.unwrap();
    assert!(inventory.list_products(&fx.bar.id, WAITER, true).await.unwrap().is_empty());
    assert_eq!(inventory.list_products(&fx.bar.id, OWNER, true).await.unwrap().len(), 1);
}
