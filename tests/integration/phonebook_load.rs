#![allow(missing_docs)]

mod common;

use common::*;
use simbook::{
    primitives::io::CardOp,
    storage::{
        pbr::{TYPE1_TAG, TYPE2_TAG},
        record::{encode_anr, encode_email},
        AuxKind, EfTag, Linkage, UNBOUNDED,
    },
    types::{FileId, SimError},
};

fn type1_card(adn_records: Vec<Vec<u8>>, email: Vec<Vec<u8>>, anr: Vec<Vec<u8>>) -> Session {
    let card = card_with_pbr(vec![container(
        TYPE1_TAG,
        &[(EfTag::Adn, ADN), (EfTag::Email, EMAIL), (EfTag::Anr, ANR)],
    )]);
    insert(&card, ADN, ADN_LEN, adn_records);
    insert(&card, EMAIL, EMAIL_LEN, email);
    insert(&card, ANR, ANR_LEN, anr);
    open(card)
}

#[test]
fn type1_email_scenario() {
    let card = card_with_pbr(vec![container(
        TYPE1_TAG,
        &[(EfTag::Adn, FileId(0x6F3A)), (EfTag::Email, FileId(0x6F50))],
    )]);
    insert(&card, FileId(0x6F3A), ADN_LEN, vec![adn("Ann", "1"), adn("Bo", "2")]);
    insert(
        &card,
        FileId(0x6F50),
        EMAIL_LEN,
        vec![encode_email(EMAIL_LEN, "a@b.c", None).unwrap(), vec![0xFF; EMAIL_LEN]],
    );
    let mut s = open(card);

    let entries = s.book.load().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].emails, vec!["a@b.c".to_string()]);
    assert!(entries[1].emails.is_empty());
    assert_eq!(s.book.pbr().unwrap().linkage(AuxKind::Email), Linkage::Type1);
    assert_eq!(s.book.free_count_in_block(AuxKind::Email, 0), 1);
    assert_eq!(s.book.free_count(AuxKind::Email), UNBOUNDED);
    assert_eq!(s.book.free_count_for_entry(AuxKind::Email, 1), UNBOUNDED);
}

#[test]
fn entry_count_is_sum_of_block_counts() {
    const ADN2: FileId = FileId(0x4F3B);
    const ADN3: FileId = FileId(0x4F3C);
    let card = card_with_pbr(vec![
        container(TYPE1_TAG, &[(EfTag::Adn, ADN)]),
        container(TYPE1_TAG, &[(EfTag::Adn, ADN2)]),
        container(TYPE1_TAG, &[(EfTag::Adn, ADN3)]),
    ]);
    insert(&card, ADN, ADN_LEN, vec![adn("A", "1"), adn("B", "2")]);
    insert(&card, ADN2, ADN_LEN, vec![]);
    insert(&card, ADN3, ADN_LEN, vec![adn("C", "3"), vec![], adn("E", "5")]);
    let mut s = open(card);

    let entries = s.book.load().unwrap();
    let blocks = s.book.pbr().unwrap().len();
    let per_block: usize = (0..blocks).map(|b| s.book.block_entry_count(b)).sum();
    assert_eq!(per_block, entries.len());
    assert_eq!(s.book.entry_count(), 5);
    assert_eq!(s.book.block_of(2), Some((2, 0)));
    assert_eq!(s.book.block_offset(2), 2);
    assert!(s.book.entry(3).unwrap().is_empty());
    assert_eq!(s.book.entry(4).unwrap().alpha, "E");
    assert_eq!(s.book.entry(4).unwrap().record_number, 3);
}

#[test]
fn second_load_issues_no_requests() {
    let mut s = type1_card(
        vec![adn("A", "1"), adn("B", "2")],
        vec![encode_email(EMAIL_LEN, "a@x", None).unwrap()],
        vec![encode_anr(ANR_LEN, "555", None).unwrap()],
    );
    s.book.load().unwrap();
    let requests = s.card.request_count();
    assert_eq!(requests, 4, "pbr, adn, email, anr");

    let again = s.book.load().unwrap();
    s.book.load_block(0).unwrap();
    assert_eq!(s.card.request_count(), requests);
    assert_eq!(s.metrics.round_trips(), requests);
    assert_eq!(again[0].additional_numbers, vec!["555".to_string()]);
}

#[test]
fn under_provisioned_anr_tail_gets_nothing() {
    let mut s = type1_card(
        vec![adn("A", "1"), adn("B", "2"), adn("C", "3"), adn("D", "4")],
        vec![],
        vec![
            encode_anr(ANR_LEN, "111", None).unwrap(),
            encode_anr(ANR_LEN, "+222", None).unwrap(),
        ],
    );
    let entries = s.book.load().unwrap();
    assert_eq!(entries[0].additional_numbers, vec!["111".to_string()]);
    assert_eq!(entries[1].additional_numbers, vec!["+222".to_string()]);
    assert!(entries[2].additional_numbers.is_empty());
    assert!(entries[3].additional_numbers.is_empty());

    assert_eq!(s.book.free_count_in_block(AuxKind::Anr, 0), 0);
    assert_eq!(s.book.free_count_for_entry(AuxKind::Anr, 3), 0);
    assert_eq!(s.book.free_count_for_entry(AuxKind::Anr, 1), UNBOUNDED);
    assert_eq!(s.book.free_count_for_entry(AuxKind::Anr, 9), 0);
    assert_eq!(s.book.free_count(AuxKind::Anr), UNBOUNDED);
}

fn type2_card() -> std::sync::Arc<simbook::primitives::io::MemCard> {
    let mut pbr = container(TYPE1_TAG, &[(EfTag::Adn, ADN), (EfTag::Iap, IAP)]);
    pbr.extend(container(TYPE2_TAG, &[(EfTag::Email, EMAIL), (EfTag::Anr, ANR)]));
    let card = card_with_pbr(vec![pbr]);
    insert(&card, ADN, ADN_LEN, vec![adn("A", "1"), adn("B", "2"), adn("C", "3")]);
    insert(
        &card,
        IAP,
        2,
        vec![vec![0x02, 0x00], vec![0x00, 0x01], vec![0x01, 0xFF]],
    );
    insert(
        &card,
        EMAIL,
        EMAIL_LEN,
        vec![
            encode_email(EMAIL_LEN, "c@x", Some(3)).unwrap(),
            encode_email(EMAIL_LEN, "a@x", Some(1)).unwrap(),
            vec![],
        ],
    );
    insert(
        &card,
        ANR,
        ANR_LEN,
        vec![encode_anr(ANR_LEN, "999", Some(2)).unwrap(), vec![]],
    );
    card
}

#[test]
fn type2_join_through_shared_iap() {
    let mut s = open(type2_card());
    let entries = s.book.load().unwrap();

    let table = s.book.pbr().unwrap();
    assert_eq!(table.linkage(AuxKind::Email), Linkage::Type2 { iap_offset: 0 });
    assert_eq!(table.linkage(AuxKind::Anr), Linkage::Type2 { iap_offset: 1 });
    assert_eq!(entries[0].emails, vec!["a@x".to_string()]);
    assert!(entries[0].additional_numbers.is_empty());
    assert!(entries[1].emails.is_empty());
    assert_eq!(entries[1].additional_numbers, vec!["999".to_string()]);
    assert_eq!(entries[2].emails, vec!["c@x".to_string()]);

    assert_eq!(s.card.request_count(), 5, "pbr, adn, iap once, email, anr");
    assert_eq!(s.book.free_count(AuxKind::Email), 1);
    assert_eq!(s.book.free_count(AuxKind::Anr), 1);
    assert_eq!(s.book.free_count_for_entry(AuxKind::Email, 2), 1);
}

#[test]
fn unshared_iap_is_read_per_kind() {
    let mut s = open_with(type2_card(), |opts| opts.share_iap_between_kinds(false));
    s.book.load().unwrap();
    assert_eq!(s.card.request_count(), 6);
    assert_eq!(
        s.metrics
            .reads_subset
            .load(std::sync::atomic::Ordering::Relaxed),
        2
    );
}

#[test]
fn extension_records_extend_numbers() {
    let card = card_with_pbr(vec![container(
        TYPE1_TAG,
        &[(EfTag::Adn, ADN), (EfTag::Ext1, EXT1)],
    )]);
    let mut long = adn("Long", "12345678901234567890");
    long[ALPHA_LEN + 13] = 0x01;
    insert(&card, ADN, ADN_LEN, vec![long, adn("Short", "42")]);
    let mut ext = vec![0xFF; 13];
    ext[..4].copy_from_slice(&[0x02, 0x02, 0x21, 0x43]);
    insert(&card, EXT1, 13, vec![ext]);
    let mut s = open(card);

    let entries = s.book.load().unwrap();
    assert_eq!(entries[0].number, "123456789012345678901234");
    assert_eq!(entries[1].number, "42");
}

#[test]
fn empty_reference_file_marks_phonebook_absent() {
    let card = card_with_pbr(vec![]);
    let mut s = open(card);
    assert!(matches!(s.book.load(), Err(SimError::PbrAbsent)));
    assert!(s.book.is_absent());
    assert!(matches!(s.book.load(), Err(SimError::PbrAbsent)));
    assert_eq!(s.card.request_count(), 1);

    s.book.reset();
    assert!(!s.book.is_absent());
    assert!(s.book.load().is_err());
    assert_eq!(s.card.request_count(), 2);
}

#[test]
fn reference_file_transport_failure_is_retryable() {
    let mut s = type1_card(vec![adn("A", "1")], vec![], vec![]);
    s.card.fail_next(CardOp::ReadAll, PBR);
    assert!(matches!(s.book.load(), Err(SimError::Transport(_))));
    assert!(!s.book.is_absent());
    assert_eq!(s.book.load().unwrap().len(), 1);
}

#[test]
fn failed_kind_stays_absent_until_reloaded() {
    let mut s = type1_card(
        vec![adn("A", "1"), adn("B", "2")],
        vec![encode_email(EMAIL_LEN, "a@x", None).unwrap()],
        vec![encode_anr(ANR_LEN, "555", None).unwrap()],
    );
    s.card.fail_next(CardOp::ReadSubset, EMAIL);
    let entries = s.book.load().unwrap();
    assert!(entries[0].emails.is_empty());
    assert_eq!(entries[0].additional_numbers, vec!["555".to_string()]);
    assert_eq!(s.book.free_count_in_block(AuxKind::Email, 0), 0);
    assert_eq!(s.metrics.failures.load(std::sync::atomic::Ordering::Relaxed), 1);

    s.book.invalidate();
    let entries = s.book.load().unwrap();
    assert_eq!(entries[0].emails, vec!["a@x".to_string()]);
    assert_eq!(entries[0].additional_numbers, vec!["555".to_string()]);
}

#[test]
fn failed_block_does_not_stop_siblings() {
    const ADN2: FileId = FileId(0x4F3B);
    let card = card_with_pbr(vec![
        container(TYPE1_TAG, &[(EfTag::Adn, ADN)]),
        container(TYPE1_TAG, &[(EfTag::Adn, ADN2)]),
    ]);
    insert(&card, ADN, ADN_LEN, vec![adn("A", "1"), adn("B", "2")]);
    insert(&card, ADN2, ADN_LEN, vec![adn("C", "3")]);
    card.fail_next(CardOp::ReadAll, ADN);
    let mut s = open(card);

    let entries = s.book.load().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].alpha, "C");

    let entries = s.book.load().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].alpha, "C");
}

#[test]
fn empty_iap_leaves_linked_kinds_absent() {
    let mut s = open(type2_card());
    insert(&s.card, IAP, 2, vec![]);
    let entries = s.book.load().unwrap();
    assert!(entries.iter().all(|e| e.emails.is_empty()));
    assert!(entries.iter().all(|e| e.additional_numbers.is_empty()));
    assert_eq!(s.book.free_count(AuxKind::Email), 0);
    assert_eq!(s.book.free_count_for_entry(AuxKind::Email, 0), UNBOUNDED);
    assert_eq!(s.book.free_count_for_entry(AuxKind::Anr, 2), UNBOUNDED);
}
