#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Exercise the discriminator-first envelope decode path (includes
    // serde_json's own UTF-8 validation and error handling).
    if let Ok(payload) = std::str::from_utf8(data) {
        if let Ok(Some(envelope)) = chatbridge_client::protocol::decode_envelope(payload) {
            // When the payload is a well-formed event envelope, also run the
            // sub-kind decode over the same bytes.
            if let chatbridge_client::protocol::ServerEnvelope::Event(header) = envelope {
                let _ = chatbridge_client::events::ChatEvent::decode(&header.event, payload);
            }
        }
    }
});
