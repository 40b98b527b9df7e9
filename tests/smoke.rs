//! Basic smoke test to verify the public API surface.

#[test]
fn crate_compiles() {
    let _ = std::any::type_name::<seatwarden::ClientConfig>();
    let _ = std::any::type_name::<seatwarden::DaemonConfig>();
    let _ = std::any::type_name::<seatwarden::SeatwardenError>();
    let _ = std::any::type_name::<seatwarden::LicenseServer>();
}

#[test]
fn error_codes_are_stable() {
    use seatwarden::ErrorCode;

    assert_eq!(ErrorCode::Ok as u16, 0);
    assert_eq!(ErrorCode::ChecksumMismatch as u16, 4);
    assert_eq!(ErrorCode::SeatLimitReached as u16, 7);
    assert_eq!(ErrorCode::MalformedRequest as u16, 10);
}
