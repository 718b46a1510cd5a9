use gsw_config::{
    from_arg_list, from_storage_key, geweke_schema, to_storage_key, ArgList, Configuration,
    OptionValue,
};
use proptest::prelude::*;

fn cctype() -> impl Strategy<Value = String> {
    prop_oneof![Just("continuous".to_string()), Just("multinomial".to_string())]
}

fn geweke_args() -> impl Strategy<Value = ArgList> {
    (
        0i64..1000,
        1i64..50,
        1i64..500,
        2i64..16,
        prop::collection::vec(cctype(), 1..12),
    )
        .prop_map(|(seed, rows, iters, values, cctypes)| {
            ArgList::new()
                .with_scalar("gen_seed", seed)
                .with_scalar("num_rows", rows)
                .with_scalar("num_cols", cctypes.len())
                .with_scalar("num_iters", iters)
                .with_scalar("num_multinomial_values", values)
                .with_list("cctypes", &cctypes)
        })
}

fn free_value() -> impl Strategy<Value = OptionValue> {
    prop_oneof![
        any::<i64>().prop_map(OptionValue::Int),
        ".{0,12}".prop_map(OptionValue::Str),
        prop::collection::vec("[a-c0-9.*+@%/ -]{0,4}", 0..6).prop_map(OptionValue::StrList),
    ]
}

proptest! {
    #[test]
    fn arg_list_round_trip(args in geweke_args()) {
        let schema = geweke_schema();
        let config = from_arg_list(&schema, &args).unwrap();
        let again = from_arg_list(&schema, &config.to_arg_list()).unwrap();
        prop_assert_eq!(again, config);
    }

    #[test]
    fn storage_key_round_trip(args in geweke_args()) {
        let schema = geweke_schema();
        let config = from_arg_list(&schema, &args).unwrap();
        let key = to_storage_key(&config);
        prop_assert!(!key.as_str().contains('/'));
        prop_assume!(!key.is_digest());
        prop_assert_eq!(from_storage_key(&schema, &key).unwrap(), config);
    }

    #[test]
    fn key_ignores_token_order(args in geweke_args()) {
        let schema = geweke_schema();
        let tokens = args.tokens().to_vec();
        // Options are emitted as (flag, value...) groups; reverse the groups.
        let mut groups: Vec<Vec<String>> = Vec::new();
        for token in tokens {
            if token.starts_with("--") {
                groups.push(vec![token]);
            } else if let Some(group) = groups.last_mut() {
                group.push(token);
            }
        }
        groups.reverse();
        let reordered = ArgList::from_tokens(groups.into_iter().flatten());
        let a = from_arg_list(&schema, &args).unwrap();
        let b = from_arg_list(&schema, &reordered).unwrap();
        prop_assert_eq!(to_storage_key(&a), to_storage_key(&b));
    }

    #[test]
    fn keys_are_injective(
        left in prop::collection::btree_map("[a-d]{1,3}", free_value(), 0..4),
        right in prop::collection::btree_map("[a-d]{1,3}", free_value(), 0..4),
    ) {
        let a: Configuration = left.into_iter().collect();
        let b: Configuration = right.into_iter().collect();
        let (ka, kb) = (to_storage_key(&a), to_storage_key(&b));
        prop_assume!(!ka.is_digest() && !kb.is_digest());
        prop_assert_eq!(ka == kb, a == b);
    }

    #[test]
    fn typical_schemas_keep_readable_keys(cctypes in prop::collection::vec(cctype(), 1..12)) {
        let schema = geweke_schema();
        let args = ArgList::new()
            .with_scalar("gen_seed", 999)
            .with_scalar("num_rows", 49)
            .with_scalar("num_cols", cctypes.len())
            .with_scalar("num_iters", 499)
            .with_scalar("num_multinomial_values", 15)
            .with_list("cctypes", &cctypes);
        let key = to_storage_key(&from_arg_list(&schema, &args).unwrap());
        prop_assert!(!key.is_digest());
    }
}
