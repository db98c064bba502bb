//! Fan-out scenarios: who gets marked, and which ancestors are counted.

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use crate::{
    domain::entry::{RootScope, UserId},
    service::__tests__::helpers::{TENANT, TestContext},
  };

  #[tokio::test]
  async fn test_mark_reaches_every_reader_but_the_author() {
    let ctx = TestContext::new().await;
    let (alice, bob, carol) = (UserId::random(), UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob, carol]);
    let docs = ctx.folder(2u64, &common, ctx.admin);
    let file = ctx.file(100u64, &docs, alice);

    ctx.mark(alice, &file).await;

    for user in [bob, carol] {
      assert_eq!(ctx.counts(user, &[&file, &docs, &common]), vec![1, 1, 1]);
    }
    assert_eq!(ctx.counts(alice, &[&file, &docs, &common]), vec![0, 0, 0]);
  }

  #[tokio::test]
  async fn test_counts_accumulate_per_descendant() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);
    let docs = ctx.folder(2u64, &common, ctx.admin);

    for id in 100..103u64 {
      let file = ctx.file(id, &docs, alice);
      ctx.mark(alice, &file).await;
    }

    assert_eq!(ctx.counts(bob, &[&docs, &common]), vec![3, 3]);
  }

  #[tokio::test]
  async fn test_marking_twice_changes_nothing() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);
    let docs = ctx.folder(2u64, &common, ctx.admin);
    let file = ctx.file(100u64, &docs, alice);

    ctx.mark(alice, &file).await;
    let once = ctx.store.new_tags();
    ctx.mark(alice, &file).await;

    assert_eq!(ctx.store.new_tags(), once);
  }

  #[tokio::test]
  async fn test_new_folder_counts_itself_until_listed() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);
    let docs = ctx.folder(2u64, &common, ctx.admin);

    let reports = ctx.folder(3u64, &docs, alice);
    ctx.mark(alice, &reports).await;
    assert_eq!(ctx.counts(bob, &[&reports, &docs, &common]), vec![1, 1, 1]);

    let q1 = ctx.file(300u64, &reports, alice);
    ctx.mark(alice, &q1).await;
    assert_eq!(ctx.counts(bob, &[&reports, &docs, &common]), vec![2, 2, 2]);

    // Listing bottom-up settles every folder on the sum of its children
    let listing = ctx.list(bob, &reports, &[&q1]).await;
    assert_eq!(listing.parent_new, Some(1));
    ctx.list(bob, &docs, &[&reports]).await;
    ctx.list(bob, &common, &[&docs]).await;

    ctx.assert_sum(bob, &reports, &[&q1]);
    ctx.assert_sum(bob, &docs, &[&reports]);
    ctx.assert_sum(bob, &common, &[&docs]);
    assert_eq!(ctx.counts(bob, &[&q1, &reports, &docs, &common]), vec![1, 1, 1, 1]);
  }

  #[tokio::test]
  async fn test_mounted_room_stops_at_the_room() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let rooms = ctx.root(50, RootScope::VirtualRooms, ctx.admin, None);
    let room = ctx.room("room-r", &rooms, alice);
    let file = ctx.file("room-r/e", &room, bob);

    ctx.mark(bob, &file).await;

    assert_eq!(ctx.counts(alice, &[&file, &room]), vec![1, 1]);
    assert_eq!(ctx.counts(bob, &[&file, &room]), vec![0, 0]);
    for tag in ctx.store.new_tags() {
      assert!(tag.entry == file.key() || tag.entry == room.key(), "unexpected mark on {}", tag.entry);
    }
  }

  #[tokio::test]
  async fn test_native_room_owner_gets_the_whole_chain() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let rooms = ctx.root(50, RootScope::VirtualRooms, ctx.admin, None);
    let room = ctx.room(51u64, &rooms, alice);
    let drafts = ctx.folder(52u64, &room, alice);
    let file = ctx.file(500u64, &drafts, bob);

    ctx.mark(bob, &file).await;

    assert_eq!(ctx.counts(alice, &[&file, &drafts, &room, &rooms]), vec![1, 1, 1, 1]);
    assert_eq!(ctx.counts(bob, &[&file, &drafts, &room, &rooms]), vec![0, 0, 0, 0]);
  }

  #[tokio::test]
  async fn test_shared_home_content_ends_at_shared_root() {
    let ctx = TestContext::new().await;
    let (bob, carol) = (UserId::random(), UserId::random());
    let home = ctx.home(10, bob);
    let shared = ctx.shared_root(20);
    let projects = ctx.folder(11u64, &home, bob);
    ctx.store.grant(&projects.key(), carol);

    let plan = ctx.file(110u64, &projects, bob);
    ctx.mark(bob, &plan).await;

    assert_eq!(ctx.counts(carol, &[&plan, &projects, &shared]), vec![1, 1, 1]);
    assert_eq!(ctx.count(carol, &home), 0);
    assert_eq!(ctx.counts(bob, &[&plan, &projects, &home]), vec![0, 0, 0]);

    // The other way round the home owner counts up to their own root
    let notes = ctx.file(111u64, &projects, carol);
    ctx.mark(carol, &notes).await;

    assert_eq!(ctx.counts(bob, &[&notes, &projects, &home]), vec![1, 1, 1]);
    assert_eq!(ctx.count(bob, &shared), 0);
  }

  #[tokio::test]
  async fn test_unreadable_ancestors_are_skipped() {
    let ctx = TestContext::new().await;
    let (bob, carol) = (UserId::random(), UserId::random());
    let home = ctx.home(10, bob);
    let shared = ctx.shared_root(20);
    let private = ctx.folder(11u64, &home, bob);
    let outbox = ctx.folder(12u64, &private, bob);
    ctx.store.grant(&outbox.key(), carol);

    let file = ctx.file(120u64, &outbox, bob);
    ctx.mark(bob, &file).await;

    assert_eq!(ctx.counts(carol, &[&file, &outbox, &private, &home, &shared]), vec![1, 1, 0, 0, 1]);
  }

  #[tokio::test]
  async fn test_explicit_recipients_replace_readers() {
    let ctx = TestContext::new().await;
    let (alice, bob, dave) = (UserId::random(), UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob, dave]);
    let file = ctx.file(100u64, &common, alice);

    ctx.engine.mark_as_new(TENANT, alice, &file, Some(vec![dave])).await.unwrap();
    ctx.engine.flush().await.unwrap();

    assert_eq!(ctx.counts(dave, &[&file, &common]), vec![1, 1]);
    assert_eq!(ctx.counts(bob, &[&file, &common]), vec![0, 0]);
  }

  #[tokio::test]
  async fn test_trashed_entries_are_never_marked() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let trash = ctx.root(90, RootScope::Trash, alice, Some(alice));
    ctx.store.grant(&trash.key(), bob);
    let file = ctx.file(900u64, &trash, alice);

    ctx.mark(alice, &file).await;

    assert!(ctx.store.new_tags().is_empty());
  }

  #[tokio::test]
  async fn test_legacy_project_goes_to_the_team() {
    let ctx = TestContext::new().await;
    let (alice, bob, carol, eve) = (UserId::random(), UserId::random(), UserId::random(), UserId::random());
    let projects = ctx.root(70, RootScope::LegacyProjects, ctx.admin, None);
    let project = ctx.tree_root(71, RootScope::LegacyProjects, alice);
    ctx.store.set_team(project.id.clone(), vec![alice, bob, carol]);
    for member in [bob, carol] {
      ctx.store.grant(&project.key(), member);
    }
    ctx.store.grant(&project.key(), eve);

    let file = ctx.file(700u64, &project, alice);
    ctx.mark(alice, &file).await;

    for member in [bob, carol] {
      assert_eq!(ctx.counts(member, &[&file, &project, &projects]), vec![1, 1, 1]);
    }
    assert_eq!(ctx.count(alice, &file), 0);
    assert_eq!(ctx.count(eve, &file), 0, "readers outside the team are not marked");
  }

  #[tokio::test]
  async fn test_legacy_project_without_team_is_a_no_op() {
    let ctx = TestContext::new().await;
    let alice = UserId::random();
    let project = ctx.tree_root(72, RootScope::LegacyProjects, alice);
    ctx.store.set_team(project.id.clone(), vec![alice]);
    let file = ctx.file(720u64, &project, alice);

    ctx.mark(alice, &file).await;

    assert!(ctx.store.new_tags().is_empty());
  }

  #[tokio::test]
  async fn test_privacy_content_counts_at_the_private_root() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let alice_private = ctx.root(80, RootScope::Privacy, alice, Some(alice));
    let bob_private = ctx.root(81, RootScope::Privacy, bob, Some(bob));
    let vault = ctx.folder(82u64, &alice_private, alice);
    ctx.store.grant(&vault.key(), bob);

    let file = ctx.file(820u64, &vault, alice);
    ctx.mark(alice, &file).await;

    assert_eq!(ctx.counts(bob, &[&file, &vault, &bob_private]), vec![1, 1, 1]);
    assert_eq!(ctx.count(bob, &alice_private), 0);
  }

  #[tokio::test]
  async fn test_notifications_carry_new_counts() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);
    let docs = ctx.folder(2u64, &common, ctx.admin);

    for id in [100u64, 101] {
      let file = ctx.file(id, &docs, alice);
      ctx.mark(alice, &file).await;
    }
    ctx.settle().await;

    let last = ctx.sink.last(bob, &docs.key()).expect("docs pushed to bob");
    assert_eq!(last.count, 2);
    assert!(ctx.sink.last(alice, &docs.key()).is_none());
  }

  #[tokio::test]
  async fn test_file_without_parent_is_dropped() {
    let ctx = TestContext::new().await;
    let (alice, bob) = (UserId::random(), UserId::random());
    let common = ctx.common_root(&[alice, bob]);
    let mut orphan = ctx.file(100u64, &common, alice);
    orphan.parent_id = None;

    ctx.mark(alice, &orphan).await;
    assert!(ctx.store.new_tags().is_empty());

    // The lane keeps going after a failed job
    let file = ctx.file(101u64, &common, alice);
    ctx.mark(alice, &file).await;
    assert_eq!(ctx.count(bob, &file), 1);
    assert_eq!(ctx.count(bob, &common), 1);
  }
}
