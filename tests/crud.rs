#[macro_use]
extern crate tracing;


use miette::Result;
use qbo_rs::{DeleteTarget, Entity, Error, Operation, UpdateMode};
use reqwest::Method;
use serde_json::json;
use test_utils::{
    MockTransport, body_json, bytes_response, company_path, json_response, test_client,
};

fn echo_invoice() -> MockTransport {
    MockTransport::always(
        200,
        json!({"Invoice": {"Id": "145", "SyncToken": "4"}, "time": "2024-05-01T12:00:00Z"}),
    )
}

#[tokio::test]
async fn update_without_id_or_sync_token_sends_nothing() {
    test_utils::do_setup();
    let (client, transport) = test_client(echo_invoice());

    for (payload, field) in [
        (json!({"SyncToken": "0", "TotalAmt": 10}), "Id"),
        (json!({"Id": "145"}), "SyncToken"),
        (json!({"Id": "", "SyncToken": "0"}), "Id"),
        (json!({"Id": "145", "SyncToken": null}), "SyncToken"),
    ] {
        let err = client.update(Entity::Invoice, &payload).await.unwrap_err();
        match err {
            Error::MissingField {
                entity,
                field: missing,
                ..
            } => {
                assert_eq!(entity, Entity::Invoice);
                assert_eq!(missing, field);
            }
            other => panic!("expected a missing field error, got {other:?}"),
        }
    }

    let err = client
        .update(Entity::Invoice, &json!(["not", "a", "record"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPayload { .. }));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn update_is_sparse_by_default() -> Result<()> {
    test_utils::do_setup();
    let (client, transport) = test_client(echo_invoice());

    let payload = json!({"Id": "145", "SyncToken": "3", "DueDate": "2024-06-01"});
    let updated = client.update(Entity::Invoice, &payload).await?;

    assert_eq!(updated, json!({"Id": "145", "SyncToken": "4"}));
    assert_eq!(payload.get("sparse"), None, "caller payload was modified");

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(company_path(request), "invoice");
    assert_eq!(request.query_param("operation"), Some("update"));
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(
        body_json(request),
        json!({"Id": "145", "SyncToken": "3", "DueDate": "2024-06-01", "sparse": true})
    );
    Ok(())
}

#[tokio::test]
async fn explicit_sparse_flag_is_kept() -> Result<()> {
    test_utils::do_setup();
    let (client, transport) = test_client(echo_invoice());

    client
        .update(
            Entity::Invoice,
            &json!({"Id": "145", "SyncToken": "3", "sparse": false}),
        )
        .await?;

    assert_eq!(body_json(&transport.requests()[0])["sparse"], json!(false));
    Ok(())
}

#[tokio::test]
async fn exchange_rates_update_without_sync_token() -> Result<()> {
    test_utils::do_setup();
    let (client, transport) = test_client(MockTransport::always(
        200,
        json!({"ExchangeRate": {"SourceCurrencyCode": "EUR", "Rate": 1.08}}),
    ));

    let updated = client
        .update(
            Entity::ExchangeRate,
            &json!({"SourceCurrencyCode": "EUR", "Rate": 1.08, "AsOfDate": "2024-05-01"}),
        )
        .await?;

    assert_eq!(updated["SourceCurrencyCode"], "EUR");
    assert_eq!(company_path(&transport.requests()[0]), "exchangerate");
    Ok(())
}

#[tokio::test]
async fn void_routes_by_entity() -> Result<()> {
    test_utils::do_setup();
    let (client, transport) = test_client(MockTransport::always(200, json!({"time": "x"})));
    let record = json!({"Id": "9", "SyncToken": "2", "TotalAmt": 100});

    client.void(Entity::Invoice, &record).await?;
    client
        .update_with(Entity::SalesReceipt, &record, UpdateMode::Void)
        .await?;
    client.void(Entity::Payment, &record).await?;
    client.entity(Entity::BillPayment).void(&record).await?;

    let requests = transport.requests();
    let summary: Vec<_> = requests
        .iter()
        .map(|r| {
            (
                company_path(r),
                r.query_param("operation").map(str::to_string),
                r.query_param("include").map(str::to_string),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("invoice".to_string(), Some("void".to_string()), None),
            ("salesreceipt".to_string(), Some("void".to_string()), None),
            (
                "payment".to_string(),
                Some("update".to_string()),
                Some("void".to_string())
            ),
            (
                "billpayment".to_string(),
                Some("update".to_string()),
                Some("void".to_string())
            ),
        ]
    );

    assert_eq!(body_json(&requests[0]), json!({"Id": "9", "SyncToken": "2"}));
    assert_eq!(
        body_json(&requests[2]),
        json!({"Id": "9", "SyncToken": "2", "sparse": true})
    );
    Ok(())
}

#[tokio::test]
async fn unsupported_operations_fail_before_dispatch() {
    test_utils::do_setup();
    let (client, transport) = test_client(MockTransport::always(200, json!({})));
    let record = json!({"Id": "1", "SyncToken": "0"});

    let err = client.void(Entity::Customer, &record).await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedOperation {
            entity: Entity::Customer,
            operation: Operation::Void,
            ..
        }
    ));

    let err = client.delete(Entity::Customer, "1").await.unwrap_err();
    assert!(err.is_precondition());

    let err = client.create(Entity::TaxRate, &json!({})).await.unwrap_err();
    assert!(err.is_precondition());

    let err = client.pdf(Entity::Bill, "1").await.unwrap_err();
    assert!(err.is_precondition());

    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn delete_by_id_reads_the_sync_token_first() -> Result<()> {
    test_utils::do_setup();
    let (client, transport) = test_client(MockTransport::new(|request| {
        let body = if request.method == Method::GET {
            json!({"Bill": {"Id": "77", "SyncToken": "5", "TotalAmt": 12}})
        } else {
            json!({"Bill": {"Id": "77", "status": "Deleted"}})
        };
        Ok(json_response(200, &body))
    }));

    let deleted = client.delete(Entity::Bill, "77").await?;
    assert_eq!(deleted["status"], "Deleted");

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(company_path(&requests[0]), "bill/77");
    assert_eq!(requests[1].method, Method::POST);
    assert_eq!(requests[1].query_param("operation"), Some("delete"));
    assert_eq!(body_json(&requests[1]), json!({"Id": "77", "SyncToken": "5"}));
    Ok(())
}

#[tokio::test]
async fn delete_with_a_full_record_skips_the_read() -> Result<()> {
    test_utils::do_setup();
    let (client, transport) = test_client(MockTransport::always(
        200,
        json!({"JournalEntry": {"Id": "3", "status": "Deleted"}}),
    ));

    let record = json!({"Id": "3", "SyncToken": "1", "Line": []});
    client
        .delete(Entity::JournalEntry, DeleteTarget::from(&record))
        .await?;

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(body_json(&requests[0]), json!({"Id": "3", "SyncToken": "1"}));

    let err = client
        .delete(Entity::JournalEntry, json!({"SyncToken": "1"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingField { field: "Id", .. }));
    assert_eq!(transport.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn create_and_get_unwrap_the_record() -> Result<()> {
    test_utils::do_setup();
    let (client, transport) = test_client(MockTransport::always(
        200,
        json!({"Customer": {"Id": "58", "DisplayName": "Acme"}, "time": "2024-05-01T12:00:00Z"}),
    ));

    let created = client
        .create(Entity::Customer, &json!({"DisplayName": "Acme"}))
        .await?;
    assert_eq!(created["Id"], "58");

    let fetched = client.entity(Entity::Customer).get("58").await?;
    assert_eq!(fetched["DisplayName"], "Acme");

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(company_path(&requests[0]), "customer");
    assert_eq!(body_json(&requests[0]), json!({"DisplayName": "Acme"}));
    assert_eq!(requests[1].method, Method::GET);
    assert_eq!(company_path(&requests[1]), "customer/58");
    assert!(requests[1].body.is_none());
    assert_eq!(requests[1].header("content-type"), None);

    let err = client.get(Entity::Customer, " ").await.unwrap_err();
    assert!(matches!(err, Error::MissingField { field: "Id", .. }));
    assert_eq!(transport.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn pdf_returns_raw_bytes() -> Result<()> {
    test_utils::do_setup();
    let document = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let served = document.clone();
    let (client, transport) = test_client(MockTransport::new(move |_| {
        Ok(bytes_response(200, &served))
    }));

    let bytes = client.pdf(Entity::Invoice, "145").await?;
    assert_eq!(bytes, document);

    let request = &transport.requests()[0];
    assert_eq!(company_path(request), "invoice/145/pdf");
    assert_eq!(request.header("accept"), Some("application/pdf"));
    Ok(())
}

#[tokio::test]
async fn send_posts_octet_stream() -> Result<()> {
    test_utils::do_setup();
    let (client, transport) = test_client(MockTransport::always(
        200,
        json!({"Estimate": {"Id": "12", "EmailStatus": "EmailSent"}}),
    ));

    let sent = client
        .send(Entity::Estimate, "12", Some("billing@example.com"))
        .await?;
    assert_eq!(sent["EmailStatus"], "EmailSent");
    client.send(Entity::Estimate, "12", None).await?;

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(company_path(&requests[0]), "estimate/12/send");
    assert_eq!(
        requests[0].header("content-type"),
        Some("application/octet-stream")
    );
    assert_eq!(
        requests[0].query_param("sendTo"),
        Some("billing@example.com")
    );
    assert_eq!(requests[1].query_param("sendTo"), None);
    Ok(())
}

#[tokio::test]
async fn company_settings_are_read_by_realm() -> Result<()> {
    test_utils::do_setup();
    let (client, transport) = test_client(MockTransport::new(|request| {
        let body = if request.url.path().ends_with("preferences") {
            json!({"Preferences": {"SalesFormsPrefs": {"AllowDeposit": true}}})
        } else {
            json!({"CompanyInfo": {"CompanyName": "Sandbox Company"}})
        };
        Ok(json_response(200, &body))
    }));

    let info = client.company_info().await?;
    assert_eq!(info["CompanyName"], "Sandbox Company");
    let preferences = client.preferences().await?;
    assert_eq!(preferences["SalesFormsPrefs"]["AllowDeposit"], true);

    let paths: Vec<_> = transport.requests().iter().map(company_path).collect();
    assert_eq!(
        paths,
        [format!("companyinfo/{}", test_utils::REALM_ID), "preferences".to_string()]
    );
    info!("company settings read");
    Ok(())
}
