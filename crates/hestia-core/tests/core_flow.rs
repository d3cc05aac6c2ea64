use std::fs;
use std::path::Path;

use hestia_core::auth::{Credentials, Registration};
use hestia_core::datastore::DataStore;
use hestia_core::error::{AuthError, StorageError, StoreError};
use hestia_core::dashboard::DashboardSummary;
use hestia_core::import::import_with;
use hestia_core::inventory::{InventoryAction, NewItem, item_from_row};
use hestia_core::model::{Persona, Priority};
use hestia_core::recipes::{NewRecipe, RecipeAction, missing_ingredients};
use hestia_core::store::AppStore;
use hestia_core::tasks::TaskAction;
use tempfile::tempdir;

fn open(dir: &Path) -> AppStore {
    let data = DataStore::open_dir(dir).expect("open datastore");
    AppStore::open(data).expect("open store")
}

fn registration(email: &str, name: &str, persona: Persona) -> Registration {
    Registration {
        email: email.to_string(),
        password: "clave-segura".to_string(),
        name: name.to_string(),
        persona: Some(persona),
    }
}

fn credentials(email: &str) -> Credentials {
    Credentials {
        email: email.to_string(),
        password: "clave-segura".to_string(),
    }
}

#[test]
fn register_then_login_in_a_new_process() {
    let temp = tempdir().expect("tempdir");

    let registered = {
        let mut store = open(temp.path());
        store
            .register(registration("ana@casa.es", "Ana", Persona::Student))
            .expect("register")
    };

    // A fresh process resumes the persisted session.
    let mut store = open(temp.path());
    assert_eq!(store.user(), Some(&registered));

    store.logout().expect("logout");
    assert!(open(temp.path()).user().is_none());

    let logged_in = store.login(credentials("ana@casa.es")).expect("login");
    assert_eq!(logged_in.id, registered.id);
    assert_eq!(logged_in.name, "Ana");
    assert_eq!(logged_in.persona, Some(Persona::Student));

    let stored = fs::read_to_string(temp.path().join("usersList.json")).expect("accounts file");
    assert!(!stored.contains("clave-segura"));
    assert!(stored.contains("$argon2id$"));
}

#[test]
fn duplicate_registration_leaves_accounts_untouched() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    store
        .register(registration("ana@casa.es", "Ana", Persona::Housewife))
        .expect("first registration");

    let accounts_path = temp.path().join("usersList.json");
    let before = fs::read_to_string(&accounts_path).expect("accounts");

    let err = store
        .register(registration("ana@casa.es", "Otra", Persona::Student))
        .unwrap_err();
    assert!(matches!(err, AuthError::DuplicateEmail));
    assert_eq!(fs::read_to_string(&accounts_path).expect("accounts"), before);
}

#[test]
fn task_changes_survive_reopening() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    store
        .register(registration("ana@casa.es", "Ana", Persona::CommonPerson))
        .expect("register");

    for title in ["Barrer", "Cocinar"] {
        store
            .dispatch(TaskAction::Add {
                title: title.to_string(),
                priority: Priority::Low,
            })
            .expect("add task");
    }
    let cocinar = store.bundle().tasks[0].clone();
    let barrer = store.bundle().tasks[1].id;

    store.dispatch(TaskAction::Toggle(cocinar.id)).expect("toggle");
    store.dispatch(TaskAction::Toggle(cocinar.id)).expect("toggle back");
    store.dispatch(TaskAction::Delete(barrer)).expect("delete");

    let reopened = open(temp.path());
    let tasks = &reopened.bundle().tasks;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0], cocinar);
    assert!(tasks.iter().all(|t| t.id != barrer));
}

#[test]
fn accounts_never_see_each_others_data() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());

    store
        .register(registration("ana@casa.es", "Ana", Persona::Student))
        .expect("register ana");
    store
        .dispatch(InventoryAction::Add(NewItem::named("Arroz")))
        .expect("add item");

    store
        .register(registration("luis@casa.es", "Luis", Persona::Housewife))
        .expect("register luis");
    assert!(store.bundle().inventory.is_empty());
    store
        .dispatch(RecipeAction::Add(NewRecipe {
            title: "Sopa".to_string(),
            ..NewRecipe::default()
        }))
        .expect("add recipe");

    store.login(credentials("ana@casa.es")).expect("back to ana");
    assert_eq!(store.bundle().inventory.len(), 1);
    assert!(store.bundle().recipes.is_empty());

    store.login(credentials("luis@casa.es")).expect("back to luis");
    assert!(store.bundle().inventory.is_empty());
    assert_eq!(store.bundle().recipes[0].title, "Sopa");
}

#[test]
fn spreadsheet_import_merges_into_inventory() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(&temp.path().join("data"));
    store
        .register(registration("ana@casa.es", "Ana", Persona::Student))
        .expect("register");
    store
        .dispatch(InventoryAction::Add(NewItem {
            name: "Tomate".to_string(),
            quantity: 2,
            ..NewItem::default()
        }))
        .expect("add item");

    let sheet = temp.path().join("compras.csv");
    fs::write(&sheet, "Nombre,Cantidad\nArroz,5\n").expect("write csv");
    let items = import_with(&sheet, item_from_row).expect("read rows");
    let emitted = store.dispatch(InventoryAction::Import(items)).expect("import");

    let inventory = &store.bundle().inventory;
    assert_eq!(inventory.len(), 2);
    assert_eq!(inventory[0].name, "Tomate");
    let arroz = &inventory[1];
    assert_eq!(arroz.name, "Arroz");
    assert_eq!(arroz.quantity, 5);
    assert_eq!(arroz.unit, "unid");
    assert_eq!(arroz.min_quantity, 1);
    assert_eq!(emitted[0].message, "1 artículos importados desde Excel");

    let recipe = hestia_core::model::Recipe {
        id: uuid::Uuid::new_v4(),
        title: "Ensalada".to_string(),
        ingredients: vec!["Tomate".to_string(), "Queso".to_string()],
        instructions: vec![],
        prep_time: String::new(),
    };
    assert_eq!(missing_ingredients(&recipe, inventory), vec!["Queso"]);
}

#[test]
fn low_stock_is_announced_once_through_the_store() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    store
        .register(registration("ana@casa.es", "Ana", Persona::Student))
        .expect("register");
    store
        .dispatch(InventoryAction::Add(NewItem {
            name: "Leche".to_string(),
            quantity: 3,
            min_quantity: 1,
            ..NewItem::default()
        }))
        .expect("add item");
    let id = store.bundle().inventory[0].id;

    let mut warnings = 0;
    for _ in 0..6 {
        let emitted = store
            .dispatch(InventoryAction::AdjustQuantity { id, delta: -1 })
            .expect("adjust");
        warnings += emitted.len();
    }
    assert_eq!(warnings, 1);
    assert_eq!(store.bundle().inventory[0].quantity, 0);
    assert_eq!(
        store.notifications().iter().next().map(|n| n.message.as_str()),
        Some("¡Stock bajo!: Leche")
    );
}

#[test]
fn dashboard_in_a_new_process_shows_earlier_warnings() {
    let temp = tempdir().expect("tempdir");
    {
        let mut store = open(temp.path());
        store
            .register(registration("ana@casa.es", "Ana", Persona::Student))
            .expect("register");
        store
            .dispatch(InventoryAction::Add(NewItem {
                name: "Leche".to_string(),
                quantity: 2,
                min_quantity: 1,
                ..NewItem::default()
            }))
            .expect("add item");
        let id = store.bundle().inventory[0].id;
        store
            .dispatch(InventoryAction::AdjustQuantity { id, delta: -1 })
            .expect("adjust");
    }

    let store = open(temp.path());
    let user = store.user().expect("resumed session");
    let summary = DashboardSummary::build(&user.name, user.persona, store.bundle(), store.notifications());
    let messages: Vec<_> = summary.notifications.iter().map(|n| n.message.as_str()).collect();
    assert_eq!(messages, vec!["¡Stock bajo!: Leche", "Añadido: Leche"]);
    assert_eq!(summary.low_stock_items, 1);
}

#[test]
fn persona_less_accounts_are_told_to_register_again() {
    let temp = tempdir().expect("tempdir");
    {
        let mut store = open(temp.path());
        store
            .register(registration("ana@casa.es", "Ana", Persona::Student))
            .expect("register");
    }
    let accounts_path = temp.path().join("usersList.json");
    let mut accounts: Vec<serde_json::Value> =
        serde_json::from_str(&fs::read_to_string(&accounts_path).expect("accounts")).expect("json");
    accounts[0]
        .as_object_mut()
        .expect("account object")
        .remove("persona");
    fs::write(&accounts_path, serde_json::to_string(&accounts).expect("json")).expect("write accounts");

    let mut store = open(temp.path());
    assert!(matches!(
        store.require_user(),
        Err(StoreError::Auth(AuthError::MissingPersona))
    ));
    let err = store.login(credentials("ana@casa.es")).unwrap_err();
    assert!(matches!(err, AuthError::MissingPersona));
    assert!(!temp.path().join("activeUser.json").exists());
}

#[test]
fn legacy_and_future_bundles() {
    let temp = tempdir().expect("tempdir");
    let user = {
        let mut store = open(temp.path());
        store
            .register(registration("ana@casa.es", "Ana", Persona::Student))
            .expect("register")
    };
    let bundle_path = temp.path().join(format!("data_{}.json", user.id));

    fs::write(
        &bundle_path,
        r#"{"tasks":[],"inventory":[{"id":"6f1c1d2e-1111-4a4a-8b8b-0123456789ab","name":"Sal","quantity":1,"unit":"kg","minQuantity":1}]}"#,
    )
    .expect("write legacy bundle");
    let store = open(temp.path());
    assert_eq!(store.bundle().schema_version, 1);
    assert_eq!(store.bundle().inventory[0].name, "Sal");

    fs::write(&bundle_path, r#"{"schemaVersion":99}"#).expect("write future bundle");
    let data = DataStore::open_dir(temp.path()).expect("open datastore");
    let err = AppStore::open(data).unwrap_err();
    assert!(matches!(
        err,
        AuthError::Storage(StorageError::UnsupportedSchema { found: 99, .. })
    ));
}

#[test]
fn mutations_require_a_session() {
    let temp = tempdir().expect("tempdir");
    let mut store = open(temp.path());
    let err = store
        .dispatch(TaskAction::Add {
            title: "x".to_string(),
            priority: Priority::Medium,
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::NoSession));
}
