#[cfg(test)]
mod tests {
    use crate::events::OrderingKey;
    use crate::report::base_units_to_display;
    use crate::rpc::decode_amount_words;

    /// Decoded log amounts must flow through to display unchanged in value
    #[test]
    fn test_decoded_amounts_render_as_token_decimals() {
        // 3.5 tokens in the first word, zeros elsewhere
        let mut data = String::from("0x");
        data.push_str(&format!("{:0>64}", "30927f74c9de0000")); // 3.5e18
        data.push_str(&"0".repeat(64 * 3));

        let decoded = decode_amount_words(&data).unwrap();
        assert_eq!(base_units_to_display(&decoded.input_token), "3.5");
        assert_eq!(base_units_to_display(&decoded.distributed_token), "0");
    }

    /// The dedup rule is a pure ordering-key comparison against the cursor
    #[test]
    fn test_cursor_comparison_is_the_dedup_rule() {
        let cursor = OrderingKey::new(101, 2, 0);

        let refetched = [
            OrderingKey::new(100, 0, 0),
            OrderingKey::new(100, 0, 1),
            OrderingKey::new(101, 2, 0),
        ];
        for key in refetched {
            assert!(key <= cursor, "{} should be dropped as overlap", key);
        }

        let fresh = [OrderingKey::new(101, 3, 0), OrderingKey::new(102, 0, 0)];
        for key in fresh {
            assert!(key > cursor, "{} should be appended", key);
        }
    }
}
