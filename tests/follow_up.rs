//! Capture, refund, lookup and webhook routing by transaction id.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use payrouter::load_balancer::Strategy;
use payrouter::processor::{
    BackendType, Cents, Currency, PaymentError, PaymentProcessor, PaymentRequest, RefundRequest,
    Registry,
};
use payrouter::sandbox::SandboxProcessor;
use payrouter::PaymentRouter;

mod common;
use common::{router_config, setup, MockProcessor};

fn pair() -> (Arc<MockProcessor>, Arc<MockProcessor>, PaymentRouter) {
    let stripe = Arc::new(MockProcessor::new("stripe"));
    let square = Arc::new(MockProcessor::new("square"));
    let (_, router) = setup(
        &[stripe.clone(), square.clone()],
        router_config(Strategy::PrimaryFallback, &["stripe", "square"]),
    );
    (stripe, square, router)
}

#[tokio::test]
async fn test_capture_goes_to_prefixed_backend() {
    let (stripe, square, router) = pair();

    let result = router.capture("square:tx_1", Cents(700)).await.unwrap();

    assert_eq!(result.transaction_id, "square:tx_1");
    assert_eq!(
        *square.last_capture.lock().unwrap(),
        Some(("tx_1".to_string(), Cents(700)))
    );
    assert_eq!(stripe.captures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_capture_never_fails_over() {
    let (stripe, square, router) = pair();
    stripe.set_failing(true);

    let err = router.capture("stripe:tx_1", Cents(100)).await.unwrap_err();

    assert!(matches!(err, PaymentError::Backend { .. }));
    assert_eq!(square.captures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_ids_rejected() {
    let (stripe, square, router) = pair();

    for id in ["tx_1", "stripe:", ":tx_1"] {
        let err = router.capture(id, Cents(100)).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidTransactionId { .. }), "{id}: {err}");

        let err = router.refund(RefundRequest::new(id, 100)).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidTransactionId { .. }), "{id}: {err}");
    }
    assert_eq!(stripe.captures.load(Ordering::SeqCst), 0);
    assert_eq!(square.refunds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_and_unavailable_backends() {
    let (stripe, _, router) = pair();

    let err = router.capture("adyen:tx_1", Cents(100)).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotFound(ref b) if b.as_str() == "adyen"));

    stripe.set_available(false);
    let err = router.capture("stripe:tx_1", Cents(100)).await.unwrap_err();
    assert!(matches!(err, PaymentError::Unavailable(ref b) if b.as_str() == "stripe"));

    let err = router.get_transaction("stripe:tx_1").await.unwrap_err();
    assert!(matches!(err, PaymentError::Unavailable(_)));
}

#[tokio::test]
async fn test_refund_strips_and_prefixes() {
    let (_, square, router) = pair();

    let mut req = RefundRequest::new("square:ch:with:colons", 250);
    req.reason = "requested_by_customer".into();
    let result = router.refund(req).await.unwrap();

    let seen = square.last_refund.lock().unwrap().clone().unwrap();
    assert_eq!(seen.transaction_id, "ch:with:colons");
    assert_eq!(seen.amount, Cents(250));
    assert_eq!(seen.reason, "requested_by_customer");
    assert_eq!(result.refund_id, "square:re_ch:with:colons");
}

#[tokio::test]
async fn test_empty_refund_id_left_unprefixed() {
    let stripe = Arc::new(MockProcessor::new("stripe"));
    let square = Arc::new(MockProcessor::new("square").returning_empty_refund_ids());
    let (_, router) = setup(
        &[stripe.clone(), square.clone()],
        router_config(Strategy::PrimaryFallback, &["stripe", "square"]),
    );

    let result = router
        .refund(RefundRequest::new("square:tx_1", 100))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.refund_id, "");
    assert_eq!(square.refunds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_declined_refund_id_still_routable() {
    let stripe = Arc::new(MockProcessor::new("stripe"));
    let square = Arc::new(MockProcessor::new("square").declining());
    let (_, router) = setup(
        &[stripe.clone(), square.clone()],
        router_config(Strategy::PrimaryFallback, &["stripe", "square"]),
    );

    let result = router
        .refund(RefundRequest::new("square:tx_1", 100))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.refund_id, "square:re_tx_1");
    assert_eq!(result.error_message.as_deref(), Some("refund declined"));
}

#[tokio::test]
async fn test_prefixed_lookup() {
    let stripe = Arc::new(MockProcessor::new("stripe").with_transaction("abc"));
    let square = Arc::new(MockProcessor::new("square").with_transaction("abc"));
    let (_, router) = setup(
        &[stripe.clone(), square.clone()],
        router_config(Strategy::PrimaryFallback, &["stripe", "square"]),
    );

    let tx = router.get_transaction("square:abc").await.unwrap();
    assert_eq!(tx.id, "square:abc");
    assert_eq!(stripe.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unprefixed_lookup_searches_in_order() {
    let stripe = Arc::new(MockProcessor::new("stripe"));
    let square = Arc::new(MockProcessor::new("square").with_transaction("legacy_1"));
    let (_, router) = setup(
        &[stripe.clone(), square.clone()],
        router_config(Strategy::PrimaryFallback, &["stripe", "square"]),
    );

    let tx = router.get_transaction("legacy_1").await.unwrap();
    assert_eq!(tx.id, "square:legacy_1");
    assert_eq!(stripe.lookups.load(Ordering::SeqCst), 1);

    let err = router.get_transaction("missing").await.unwrap_err();
    assert!(matches!(err, PaymentError::TransactionNotFound(ref id) if id == "missing"));
}

#[tokio::test]
async fn test_webhook_first_accepting_backend() {
    let stripe = Arc::new(MockProcessor::new("stripe"));
    let square = Arc::new(MockProcessor::new("square").accepting_webhooks());
    let adyen = Arc::new(MockProcessor::new("adyen").accepting_webhooks());
    let (_, router) = setup(
        &[stripe.clone(), square.clone(), adyen.clone()],
        router_config(Strategy::PrimaryFallback, &["stripe", "square", "adyen"]),
    );

    let event = router.validate_webhook(b"{}", "sig").await.unwrap();
    assert_eq!(event.processor.as_str(), "square");
    assert_eq!(stripe.webhooks.load(Ordering::SeqCst), 1);
    assert_eq!(adyen.webhooks.load(Ordering::SeqCst), 0);

    let err = router.validate_webhook(b"{}", "").await.unwrap_err();
    assert!(matches!(err, PaymentError::WebhookValidationFailed));
}

#[tokio::test]
async fn test_sandbox_round_trip() {
    let registry = Arc::new(Registry::default());
    let stripe = Arc::new(SandboxProcessor::new("stripe", vec![Currency::new("usd")]));
    stripe.fail_charges(true);
    let square = Arc::new(SandboxProcessor::new("square", vec![Currency::new("usd")]));
    registry.register(stripe.clone());
    registry.register(square.clone());
    let router = PaymentRouter::new(
        registry,
        router_config(Strategy::PrimaryFallback, &["stripe", "square"]),
    );

    let auth = router
        .authorize(PaymentRequest::new(2000, "usd"))
        .await
        .unwrap();
    assert!(auth.transaction_id.starts_with("square:auth_"));

    let captured = router.capture(&auth.transaction_id, Cents(0)).await.unwrap();
    assert_eq!(captured.transaction_id, auth.transaction_id);

    let refund = router
        .refund(RefundRequest::new(captured.transaction_id.clone(), 2000))
        .await
        .unwrap();
    assert!(refund.success);
    assert!(refund.refund_id.starts_with("square:re_"));

    let tx = router.get_transaction(&auth.transaction_id).await.unwrap();
    assert_eq!(tx.id, auth.transaction_id);
    assert_eq!(tx.status, "refunded");
    assert_eq!(tx.currency, Currency::new("usd"));

    let refund_tx = router.get_transaction(&refund.refund_id).await.unwrap();
    assert_eq!(refund_tx.kind, "refund");

    assert_eq!(stripe.calls().authorize, 1);
    assert_eq!(stripe.calls().capture, 0);
    assert_eq!(
        router.breaker_state(&BackendType::from("square")),
        Some(payrouter::resilience::CircuitState::Closed)
    );
}
