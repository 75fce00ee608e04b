mod common;

use std::sync::Arc;

use common::*;

use norsh_chain::crypto;
use norsh_chain::dispatch::Dispatcher;
use norsh_chain::types::{
    Element, ElementMetadataRequest, Envelope, OperationStatus, Transaction, Verb,
};

#[test]
fn envelope_round_trip_caches_the_response() {
    let harness = harness();
    let dispatcher = Dispatcher::new(harness.services.clone());
    let sender_keys = keypair(21);
    let sender = owner_of(&sender_keys);
    let element = create_element(&harness, &sender_keys, "NSH");
    seed_balance(&harness, &sender, &element.id, "10000");

    let request = transfer_request(&sender_keys, &element.id, "receiver", "100", "d1");
    let envelope = Envelope::request(
        "req-1",
        "TransactionCreate",
        Verb::Post,
        serde_json::to_value(&request).unwrap(),
    );
    let response = dispatcher.dispatch(&envelope);
    assert_eq!(response.status, Some(OperationStatus::Ok));
    let tx: Transaction = serde_json::from_value(response.data.clone().unwrap()).unwrap();
    assert!(tx.confirmed);

    let cached: Envelope = harness
        .services
        .cache
        .get_json("req-1")
        .expect("cache read")
        .expect("cached response");
    assert_eq!(cached.status, Some(OperationStatus::Ok));
    assert_eq!(cached.request_id, "req-1");
}

#[test]
fn unknown_payload_tags_are_rejected_as_internal() {
    let harness = harness();
    let dispatcher = Dispatcher::new(harness.services.clone());
    let envelope = Envelope::request("req-2", "SomethingElse", Verb::Post, serde_json::json!({}));
    let response = dispatcher.dispatch(&envelope);
    assert_eq!(response.status, Some(OperationStatus::Internal));

    // Verb mismatch on a known tag is also unroutable.
    let envelope = Envelope::request("req-3", "TransactionCreate", Verb::Delete, serde_json::json!({}));
    let response = dispatcher.dispatch(&envelope);
    assert_eq!(response.status, Some(OperationStatus::Internal));
}

#[test]
fn malformed_payloads_come_back_as_errors() {
    let harness = harness();
    let dispatcher = Dispatcher::new(harness.services.clone());
    let envelope = Envelope::request(
        "req-4",
        "TransactionCreate",
        Verb::Post,
        serde_json::json!({"volume": 12}),
    );
    let response = dispatcher.dispatch(&envelope);
    assert_eq!(response.status, Some(OperationStatus::Error));
}

#[test]
fn element_get_dispatches_by_tag_and_verb() {
    let harness = harness();
    let dispatcher = Dispatcher::new(harness.services.clone());
    let owner_keys = keypair(22);
    let element = create_element(&harness, &owner_keys, "NSH");

    let envelope = Envelope::request(
        "req-5",
        "ElementGet",
        Verb::Get,
        serde_json::json!({"id": element.id}),
    );
    let response = dispatcher.dispatch(&envelope);
    assert_eq!(response.status, Some(OperationStatus::Ok));
    let found: Element = serde_json::from_value(response.data.unwrap()).unwrap();
    assert_eq!(found.symbol, "NSH");

    let envelope = Envelope::request(
        "req-6",
        "ElementGet",
        Verb::Get,
        serde_json::json!({"id": "missing"}),
    );
    let response = dispatcher.dispatch(&envelope);
    assert_eq!(response.status, Some(OperationStatus::NotFound));
}

fn metadata_request(
    owner_keys: &ed25519_dalek::Keypair,
    element: &Element,
    name: Option<&str>,
    marker: &str,
    with_fee: bool,
) -> ElementMetadataRequest {
    let hash = crypto::keccak_hex(&format!("metadata:{marker}"));
    let signature = crypto::sign_hash(owner_keys, &hash).expect("signature");
    let transaction = with_fee.then(|| {
        transfer_request(
            owner_keys,
            &element.id,
            &owner_of(owner_keys),
            "1",
            &format!("fee:{marker}"),
        )
    });
    ElementMetadataRequest {
        id: element.id.clone(),
        hash,
        public_key: public_material(owner_keys),
        signature,
        name: name.map(str::to_string),
        about: None,
        logo: None,
        site: None,
        policy: None,
        transaction,
    }
}

#[test]
fn metadata_updates_gate_on_a_fee_once_present() {
    let harness = harness();
    let owner_keys = keypair(23);
    let owner = owner_of(&owner_keys);
    let element = create_element(&harness, &owner_keys, "NSH");
    seed_balance(&harness, &owner, &element.id, "100");

    // First write: no metadata yet, no fee required.
    let first = metadata_request(&owner_keys, &element, Some("Norsh"), "m1", false);
    let outcome = harness.services.elements.set_metadata(&first).expect("set metadata");
    assert!(outcome.is_ok(), "first update failed: {outcome:?}");
    let updated: Element = outcome_data(&outcome);
    assert_eq!(updated.metadata.as_ref().unwrap().get("name").unwrap(), "Norsh");

    // Second write without a fee transaction is rejected.
    let missing_fee = metadata_request(&owner_keys, &element, Some("Renamed"), "m2", false);
    let outcome = harness
        .services
        .elements
        .set_metadata(&missing_fee)
        .expect("set metadata");
    assert_eq!(outcome.status, OperationStatus::Error);

    // With the fee transfer attached the patch lands and the fee commits.
    let with_fee = metadata_request(&owner_keys, &element, Some("Renamed"), "m3", true);
    let outcome = harness
        .services
        .elements
        .set_metadata(&with_fee)
        .expect("set metadata");
    assert!(outcome.is_ok(), "gated update failed: {outcome:?}");
    let updated: Element = outcome_data(&outcome);
    assert_eq!(updated.metadata.as_ref().unwrap().get("name").unwrap(), "Renamed");

    let fee_tx = harness
        .services
        .store
        .find_transaction(&{
            // The fee transaction chains at the element's sequence head.
            harness
                .services
                .sequences
                .get(&element.id)
                .expect("sequence")
                .data
                .expect("fee transaction id")
        })
        .expect("lookup")
        .expect("fee transaction");
    assert!(fee_tx.confirmed);
    assert_eq!(
        fee_tx.metadata.as_ref().unwrap().get("action").unwrap(),
        "UPDATE"
    );
}

#[test]
fn owner_mismatch_is_forbidden() {
    let harness = harness();
    let owner_keys = keypair(24);
    let intruder_keys = keypair(25);
    let element = create_element(&harness, &owner_keys, "NSH");

    let request = metadata_request(&intruder_keys, &element, Some("Hijack"), "x1", false);
    let outcome = harness.services.elements.set_metadata(&request).expect("set metadata");
    assert_eq!(outcome.status, OperationStatus::Forbidden);
}

#[test]
fn element_create_rejects_duplicate_hashes() {
    let harness = harness();
    let owner_keys = keypair(26);
    let _element = create_element(&harness, &owner_keys, "NSH");

    let hash = crypto::keccak_hex("element:NSH");
    let signature = crypto::sign_hash(&owner_keys, &hash).expect("signature");
    let duplicate = norsh_chain::types::ElementCreateRequest {
        element_type: norsh_chain::types::ElementType::Coin,
        symbol: "NSH".to_string(),
        decimals: 18,
        initial_supply: Some(45_000_000),
        tfo: None,
        hash,
        public_key: public_material(&owner_keys),
        signature,
    };
    let outcome = harness.services.elements.create(&duplicate).expect("create");
    assert_eq!(outcome.status, OperationStatus::Exists);
}

#[test]
fn services_are_shared_without_globals() {
    // Two dispatchers over one composition observe the same state.
    let harness = harness();
    let dispatcher_a = Dispatcher::new(Arc::clone(&harness.services));
    let dispatcher_b = Dispatcher::new(Arc::clone(&harness.services));
    let owner_keys = keypair(27);
    let element = create_element(&harness, &owner_keys, "NSH");

    let envelope = Envelope::request(
        "req-a",
        "ElementGet",
        Verb::Get,
        serde_json::json!({"id": element.id}),
    );
    assert_eq!(dispatcher_a.dispatch(&envelope).status, Some(OperationStatus::Ok));
    assert_eq!(dispatcher_b.dispatch(&envelope).status, Some(OperationStatus::Ok));
}
