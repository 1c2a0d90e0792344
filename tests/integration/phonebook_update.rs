#![allow(missing_docs)]

mod common;

use std::sync::atomic::Ordering;

use common::*;
use simbook::{
    primitives::io::CardOp,
    storage::{
        pbr::{TYPE1_TAG, TYPE2_TAG},
        record::{anr, encode_anr, encode_email, is_sentinel},
        AuxKind, EfTag, UNBOUNDED,
    },
    types::SimError,
};

fn type1_session() -> Session {
    let card = card_with_pbr(vec![container(
        TYPE1_TAG,
        &[(EfTag::Adn, ADN), (EfTag::Email, EMAIL), (EfTag::Anr, ANR)],
    )]);
    insert(&card, ADN, ADN_LEN, vec![adn("A", "1"), adn("B", "2"), adn("C", "3")]);
    insert(
        &card,
        EMAIL,
        EMAIL_LEN,
        vec![vec![], encode_email(EMAIL_LEN, "x@a", None).unwrap()],
    );
    insert(
        &card,
        ANR,
        ANR_LEN,
        vec![encode_anr(ANR_LEN, "+1234P5", None).unwrap(), vec![], vec![]],
    );
    let mut s = open(card);
    s.book.load().unwrap();
    s
}

/// Three entries; email slots 1 and 3 are taken by entries 0 and 1, slot 2 is free.
fn type2_session() -> Session {
    let mut pbr = container(TYPE1_TAG, &[(EfTag::Adn, ADN), (EfTag::Iap, IAP)]);
    pbr.extend(container(TYPE2_TAG, &[(EfTag::Email, EMAIL)]));
    let card = card_with_pbr(vec![pbr]);
    insert(&card, ADN, ADN_LEN, vec![adn("A", "1"), adn("B", "2"), adn("C", "3")]);
    insert(&card, IAP, 1, vec![vec![0x01], vec![0x03], vec![0x00]]);
    insert(
        &card,
        EMAIL,
        EMAIL_LEN,
        vec![
            encode_email(EMAIL_LEN, "a@x", Some(1)).unwrap(),
            vec![],
            encode_email(EMAIL_LEN, "b@x", Some(2)).unwrap(),
        ],
    );
    let mut s = open(card);
    s.book.load().unwrap();
    s
}

#[test]
fn type2_add_allocates_first_free_slot() {
    let mut s = type2_session();
    assert_eq!(s.book.free_count(AuxKind::Email), 1);

    assert!(s.book.update_email(2, "", "c@x"));

    let written = s.card.record(EMAIL, 2).unwrap();
    assert_eq!(&written[..3], &[0x63, 0x00, 0x78]);
    assert_eq!(written[EMAIL_LEN - 1], 3, "back reference to ADN record 3");
    assert_eq!(s.card.record(IAP, 3), Some(vec![0x02]));
    assert_eq!(s.book.entry(2).unwrap().emails, vec!["c@x".to_string()]);
    assert_eq!(s.book.free_count(AuxKind::Email), 0);
    assert_eq!(s.metrics.email_slots_written.load(Ordering::Relaxed), 1);
    assert_eq!(s.metrics.iap_rewrites.load(Ordering::Relaxed), 1);
}

#[test]
fn type2_replace_keeps_pointer() {
    let mut s = type2_session();
    let requests = s.card.request_count();
    assert!(s.book.update_email(1, "b@x", "bb@x"));
    assert_eq!(s.card.request_count(), requests + 2, "size and write only");
    assert_eq!(s.card.record(IAP, 2), Some(vec![0x03]));
    assert_eq!(s.book.entry(1).unwrap().emails, vec!["bb@x".to_string()]);
}

#[test]
fn type2_delete_clears_pointer() {
    let mut s = type2_session();
    assert!(s.book.update_email(0, "a@x", ""));
    assert!(is_sentinel(&s.card.record(EMAIL, 1).unwrap()));
    assert_eq!(s.card.record(IAP, 1), Some(vec![0x00]));
    assert!(s.book.entry(0).unwrap().emails.is_empty());
    assert_eq!(s.book.free_count(AuxKind::Email), 2);
}

#[test]
fn type2_add_without_free_slot_fails() {
    let mut pbr = container(TYPE1_TAG, &[(EfTag::Adn, ADN), (EfTag::Iap, IAP)]);
    pbr.extend(container(TYPE2_TAG, &[(EfTag::Email, EMAIL)]));
    let card = card_with_pbr(vec![pbr]);
    insert(&card, ADN, ADN_LEN, vec![adn("A", "1"), adn("B", "2"), adn("C", "3")]);
    insert(&card, IAP, 1, vec![vec![0x01], vec![0x02], vec![0xFF]]);
    insert(
        &card,
        EMAIL,
        EMAIL_LEN,
        vec![
            encode_email(EMAIL_LEN, "a@x", Some(1)).unwrap(),
            encode_email(EMAIL_LEN, "b@x", Some(2)).unwrap(),
        ],
    );
    let mut s = open(card);
    s.book.load().unwrap();
    assert_eq!(s.book.free_count(AuxKind::Email), 0);

    let requests = s.card.request_count();
    assert!(matches!(
        s.book.try_update_field(2, "", "c@x", AuxKind::Email),
        Err(SimError::NoFreeSlot)
    ));
    assert!(matches!(
        s.book.try_update_field(2, "c@x", "d@x", AuxKind::Email),
        Err(SimError::NoLinkedSlot)
    ));
    assert_eq!(s.card.request_count(), requests);
}

#[test]
fn type1_anr_delete_writes_sentinel_record() {
    let mut s = type1_session();
    assert_eq!(
        s.book.entry(0).unwrap().additional_numbers,
        vec!["+1234P5".to_string()]
    );
    assert_eq!(s.book.free_count_in_block(AuxKind::Anr, 0), 2);

    assert!(s.book.update_anr(0, "+1234P5", ""));

    let record = s.card.record(ANR, 1).unwrap();
    assert_eq!(record, vec![0xFF; ANR_LEN]);
    assert_eq!(s.book.free_count_in_block(AuxKind::Anr, 0), 3);
    assert!(s.book.entry(0).unwrap().additional_numbers.is_empty());
    assert_eq!(s.metrics.iap_rewrites.load(Ordering::Relaxed), 0);
}

#[test]
fn type1_add_uses_positional_slot() {
    let mut s = type1_session();
    assert!(s.book.update_anr(2, "", "+44p1w2"));
    let record = s.card.record(ANR, 3).unwrap();
    assert_eq!(record[anr::BCD_LEN], 4);
    assert_eq!(record[anr::ADN_RECORD_ID], 0xFF, "no back reference under positional linkage");
    assert_eq!(
        s.book.entry(2).unwrap().additional_numbers,
        vec!["+44P1W2".to_string()]
    );
    assert_eq!(s.book.free_count_for_entry(AuxKind::Anr, 2), 1);

    assert!(s.book.update_email(1, "x@a", "y@b"));
    assert_eq!(s.book.entry(1).unwrap().emails, vec!["y@b".to_string()]);
    assert_eq!(s.book.free_count_for_entry(AuxKind::Email, 1), UNBOUNDED);
}

#[test]
fn slot_beyond_file_is_rejected() {
    let mut s = type1_session();
    let requests = s.card.request_count();
    assert!(matches!(
        s.book.try_update_field(2, "", "c@x", AuxKind::Email),
        Err(SimError::SlotOutOfRange { slot: 3, count: 2 })
    ));
    assert_eq!(s.card.request_count(), requests + 1, "size query only");
    assert!(s.book.entry(2).unwrap().emails.is_empty());
}

#[test]
fn unencodable_values_are_rejected_before_writing() {
    let mut s = type1_session();
    let requests = s.card.request_count();
    assert!(!s.book.update_email(0, "", "far-too-long@example.org"));
    assert!(!s.book.update_anr(1, "", "123456789012345678901234"));
    assert!(!s.book.update_anr(1, "", "12-34"));
    assert_eq!(s.card.request_count(), requests + 3);
    assert_eq!(s.metrics.writes.load(Ordering::Relaxed), 0);
}

#[test]
fn write_failure_leaves_state_untouched() {
    let mut s = type1_session();
    s.card.fail_next(CardOp::Write, EMAIL);
    assert!(!s.book.update_email(1, "x@a", "y@b"));
    assert_eq!(s.book.entry(1).unwrap().emails, vec!["x@a".to_string()]);
    assert_eq!(
        s.card.record(EMAIL, 2),
        Some(encode_email(EMAIL_LEN, "x@a", None).unwrap())
    );

    s.card.fail_next(CardOp::Size, EMAIL);
    assert!(matches!(
        s.book.try_update_field(1, "x@a", "y@b", AuxKind::Email),
        Err(SimError::Transport(_))
    ));
    assert!(s.book.update_email(1, "x@a", "y@b"));
}

#[test]
fn failed_pointer_write_is_not_rolled_back() {
    let mut s = type2_session();
    s.card.fail_next(CardOp::Write, IAP);
    assert!(!s.book.update_email(2, "", "c@x"));

    assert!(!is_sentinel(&s.card.record(EMAIL, 2).unwrap()));
    assert_eq!(s.card.record(IAP, 3), Some(vec![0x00]));
    assert!(s.book.entry(2).unwrap().emails.is_empty());
    assert_eq!(s.book.free_count(AuxKind::Email), 0);
}

#[test]
fn updates_need_a_loaded_entry() {
    let card = card_with_pbr(vec![container(TYPE1_TAG, &[(EfTag::Adn, ADN)])]);
    insert(&card, ADN, ADN_LEN, vec![adn("A", "1")]);
    let mut s = open(card);
    assert!(matches!(
        s.book.try_update_field(0, "", "a@b", AuxKind::Email),
        Err(SimError::IndexOutOfRange(0))
    ));
    s.book.load().unwrap();
    assert!(matches!(
        s.book.try_update_field(0, "", "a@b", AuxKind::Email),
        Err(SimError::MissingFile { block: 0, .. })
    ));
}

#[test]
fn type2_add_over_linked_slot_replaces_value() {
    let mut s = type2_session();
    assert!(s.book.update_email(0, "", "z@x"));
    assert_eq!(s.card.record(IAP, 1), Some(vec![0x01]));
    assert_eq!(s.book.entry(0).unwrap().emails, vec!["z@x".to_string()]);

    s.book.reset();
    let reloaded = s.book.load().unwrap();
    assert_eq!(reloaded[0].emails, vec!["z@x".to_string()]);
}

#[test]
fn type1_replace_with_stale_old_value_tracks_card() {
    let mut s = type1_session();
    assert!(s.book.update_email(1, "stale", "y@b"));
    assert_eq!(s.book.entry(1).unwrap().emails, vec!["y@b".to_string()]);

    s.book.reset();
    let reloaded = s.book.load().unwrap();
    assert_eq!(reloaded[1].emails, vec!["y@b".to_string()]);
}

#[test]
fn slots_past_pointer_range_are_never_allocated() {
    let mut pbr = container(TYPE1_TAG, &[(EfTag::Adn, ADN), (EfTag::Iap, IAP)]);
    pbr.extend(container(TYPE2_TAG, &[(EfTag::Email, EMAIL)]));
    let card = card_with_pbr(vec![pbr]);
    insert(&card, ADN, ADN_LEN, (0..128).map(|_| adn("A", "1")).collect());
    let mut pointers: Vec<Vec<u8>> = (1..=127u8).map(|slot| vec![slot]).collect();
    pointers.push(vec![0x00]);
    insert(&card, IAP, 1, pointers);
    let mut emails: Vec<Vec<u8>> = (1..=127u8)
        .map(|adn_record| encode_email(EMAIL_LEN, "a@x", Some(adn_record)).unwrap())
        .collect();
    emails.push(vec![]);
    insert(&card, EMAIL, EMAIL_LEN, emails);
    let mut s = open(card);
    s.book.load().unwrap();
    assert_eq!(s.book.free_count(AuxKind::Email), 1);

    assert!(matches!(
        s.book.try_update_field(127, "", "b@x", AuxKind::Email),
        Err(SimError::NoFreeSlot)
    ));
    assert_eq!(s.card.record(IAP, 128), Some(vec![0x00]));
}
