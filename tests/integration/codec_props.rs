#![allow(missing_docs)]

mod common;

use common::*;
use proptest::prelude::*;
use simbook::{
    primitives::bytes::tlv::TlvReader,
    storage::{
        pbr::TYPE1_TAG,
        record::{decode_anr, decode_email, encode_anr, encode_email, is_sentinel},
        AdnRecord, AuxKind, EfTag, PbrTable,
    },
    types::FileId,
};

proptest! {
    #[test]
    fn email_roundtrip(s in "[a-z0-9._@-]{1,20}", back_ref in 1u8..=250) {
        let data = encode_email(24, &s, Some(back_ref)).unwrap();
        prop_assert_eq!(data.len(), 24);
        prop_assert_eq!(data[23], back_ref);
        prop_assert_eq!(decode_email(&data), s);
    }

    #[test]
    fn anr_roundtrip_uppercases_separators(s in "\\+?[0-9]{1,8}([pPwW][0-9]{1,4}){0,2}") {
        let data = encode_anr(ANR_LEN, &s, None).unwrap();
        prop_assert!(!is_sentinel(&data));
        prop_assert_eq!(decode_anr(&data), s.to_uppercase());
    }

    #[test]
    fn arbitrary_bytes_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = TlvReader::new(&raw).count();
        let table = PbrTable::parse(std::slice::from_ref(&raw));
        prop_assert_eq!(table.len(), 1);
        let _ = AdnRecord::decode(FileId(0x4F3A), 1, &raw);
        let _ = decode_anr(&raw);
        let _ = decode_email(&raw);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn type1_free_slots_match_unattached_records(
        occupied in proptest::collection::vec(any::<bool>(), 1..8),
        entries in 1usize..8,
    ) {
        let card = card_with_pbr(vec![container(
            TYPE1_TAG,
            &[(EfTag::Adn, ADN), (EfTag::Email, EMAIL)],
        )]);
        let adns = (0..entries).map(|i| adn("N", &i.to_string())).collect();
        insert(&card, ADN, ADN_LEN, adns);
        let emails = occupied
            .iter()
            .map(|used| {
                if *used {
                    encode_email(EMAIL_LEN, "a@b", None).unwrap()
                } else {
                    vec![]
                }
            })
            .collect();
        insert(&card, EMAIL, EMAIL_LEN, emails);
        let mut s = open(card);

        let loaded = s.book.load().unwrap();
        let joined = occupied.iter().take(entries).filter(|used| **used).count();
        let attached: usize = loaded.iter().map(|e| e.emails.len()).sum();
        prop_assert_eq!(attached, joined);
        prop_assert_eq!(
            s.book.free_count_in_block(AuxKind::Email, 0),
            occupied.len().min(entries) - joined
        );
    }
}
