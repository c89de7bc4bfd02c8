//! Editor behaviour against an in-memory world: buffering, caching, slice decay, transforms and
//! teardown.

mod common;

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use common::{GatedTransport, MemoryTransport, Request, chunk_blob, config, pos};
use gdmc_client::flush_pool::RETAINED_RESULTS;
use gdmc_client::{
    Block, BlockBox, BlockPos, Editor, EditorConfig, Flip, FlushId, FlushOutcome, InterfaceError,
    Rect, Transform,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn buffered(limit: usize) -> EditorConfig {
    EditorConfig {
        buffering: true,
        buffer_limit: limit,
        ..config()
    }
}

fn stone() -> Block {
    Block::new("minecraft:stone")
}

fn row(n: i64) -> Vec<BlockPos> {
    (0..n).map(|x| pos(x, 64, 0)).collect()
}

// ---------------------------------------------------------------------------
// Buffering
// ---------------------------------------------------------------------------

#[test]
fn full_buffer_flushes_before_the_next_write() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(buffered(2), world.clone()).unwrap();

    for p in row(3) {
        assert!(editor.place_block(p, stone(), None).unwrap());
    }

    let writes = world.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].len(), 2);
    assert_eq!(editor.pending_writes(), 1);

    assert!(matches!(editor.flush_buffer().unwrap(), FlushOutcome::Sent(r) if r.placed == 1));
    assert_eq!(world.writes().len(), 2);
    assert_eq!(editor.flush_buffer().unwrap(), FlushOutcome::Nothing);
}

#[test]
fn rewriting_a_buffered_position_keeps_the_latest_block() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(buffered(16), world.clone()).unwrap();
    let p = pos(1, 64, 1);

    editor.place_block(p, stone(), None).unwrap();
    editor.place_block(p, Block::new("minecraft:dirt"), None).unwrap();

    assert_eq!(editor.get_block_global(p).unwrap().id, "minecraft:dirt");
    assert_eq!(world.block_reads(), 0);

    editor.flush_buffer().unwrap();
    assert_eq!(world.writes(), vec![vec![(p, Block::new("minecraft:dirt"))]]);
}

#[test]
fn deferred_commands_run_after_the_blocks() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(buffered(16), world.clone()).unwrap();

    editor.place_block(pos(0, 64, 0), stone(), None).unwrap();
    let statuses = editor.run_command("say placed", None, true).unwrap();
    assert!(statuses.is_empty());
    assert!(world.requests().is_empty());

    editor.flush_buffer().unwrap();
    let requests = world.requests();
    assert!(matches!(requests[0], Request::Write(..)));
    assert_eq!(requests[1], Request::Commands("say placed".into()));
}

#[test]
fn place_blocks_batches_and_restores_buffering() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();

    assert!(editor.place_blocks(row(5), stone(), None).unwrap());

    assert!(!editor.buffering());
    assert_eq!(editor.pending_writes(), 0);
    let writes = world.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].len(), 5);
}

#[test]
fn setting_changes_flush_under_the_old_settings() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(buffered(16), world.clone()).unwrap();

    editor.place_block(pos(0, 64, 0), stone(), None).unwrap();
    editor.set_do_block_updates(false).unwrap();
    editor.place_block(pos(1, 64, 0), stone(), None).unwrap();
    editor.set_buffering(false).unwrap();

    let options: Vec<bool> = world
        .requests()
        .into_iter()
        .filter_map(|r| match r {
            Request::Write(_, options) => Some(options.do_block_updates),
            _ => None,
        })
        .collect();
    assert_eq!(options, vec![true, false]);
}

#[test]
fn shrinking_the_limit_below_the_pending_count_flushes() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(buffered(16), world.clone()).unwrap();

    for p in row(4) {
        editor.place_block(p, stone(), None).unwrap();
    }
    editor.set_buffer_limit(3).unwrap();

    assert_eq!(editor.pending_writes(), 0);
    assert_eq!(world.writes()[0].len(), 4);
}

// ---------------------------------------------------------------------------
// Reads and caching
// ---------------------------------------------------------------------------

#[test]
fn cached_reads_skip_the_network() {
    let world = MemoryTransport::new();
    world.set_block(pos(3, 70, 3), Block::new("minecraft:oak_log").with_state("axis", "y"));
    let mut editor = Editor::with_transport(
        EditorConfig {
            caching: true,
            ..config()
        },
        world.clone(),
    )
    .unwrap();

    let first = editor.get_block_global(pos(3, 70, 3)).unwrap();
    let second = editor.get_block_global(pos(3, 70, 3)).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.states["axis"], "y");
    assert_eq!(world.block_reads(), 1);
}

#[test]
fn cache_evicts_the_least_recently_used_position() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(
        EditorConfig {
            caching: true,
            cache_limit: 2,
            ..config()
        },
        world.clone(),
    )
    .unwrap();
    let (a, b, c) = (pos(0, 0, 0), pos(1, 0, 0), pos(2, 0, 0));

    editor.get_block_global(a).unwrap();
    editor.get_block_global(b).unwrap();
    editor.get_block_global(a).unwrap();
    assert_eq!(world.block_reads(), 2);

    // `b` is now the stalest entry and makes way for `c`.
    editor.get_block_global(c).unwrap();
    editor.get_block_global(a).unwrap();
    assert_eq!(world.block_reads(), 3);
    editor.get_block_global(b).unwrap();
    assert_eq!(world.block_reads(), 4);
}

#[test]
fn writes_update_the_cache() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(
        EditorConfig {
            caching: true,
            ..config()
        },
        world.clone(),
    )
    .unwrap();

    editor.place_block(pos(5, 5, 5), stone(), None).unwrap();
    assert_eq!(editor.get_block_global(pos(5, 5, 5)).unwrap(), stone());
    assert_eq!(world.block_reads(), 0);
}

#[test]
fn changing_dimension_flushes_and_forgets_cached_blocks() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(
        EditorConfig {
            caching: true,
            buffering: true,
            ..config()
        },
        world.clone(),
    )
    .unwrap();

    editor.place_block(pos(0, 64, 0), stone(), None).unwrap();
    editor.set_dimension(Some("the_nether".into())).unwrap();

    let dimensions: Vec<Option<String>> = world
        .requests()
        .into_iter()
        .filter_map(|r| match r {
            Request::Write(_, options) => Some(options.dimension),
            _ => None,
        })
        .collect();
    assert_eq!(dimensions, vec![None]);

    editor.get_block_global(pos(0, 64, 0)).unwrap();
    assert_eq!(world.block_reads(), 1);
}

#[test]
fn biomes_come_from_the_network_without_a_slice() {
    let world = MemoryTransport::new();
    world
        .world()
        .biomes
        .insert(pos(1, 2, 3), "minecraft:desert".into());
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();

    assert_eq!(editor.get_biome_global(pos(1, 2, 3)).unwrap(), "minecraft:desert");
    assert_eq!(editor.get_biome_global(pos(9, 9, 9)).unwrap(), "");
}

// ---------------------------------------------------------------------------
// World slices
// ---------------------------------------------------------------------------

#[test]
fn written_positions_decay_out_of_the_slice() {
    let world = MemoryTransport::new();
    world.world().chunks = Some(chunk_blob("minecraft:stone"));
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();

    editor
        .cache_world_slice(Some(Rect::new(0, 0, 16, 16)), &[])
        .unwrap();
    let (touched, untouched) = (pos(4, 70, 4), pos(5, 70, 5));
    assert_eq!(editor.decay_at(touched), Some(false));
    assert_eq!(editor.decay_at(pos(40, 70, 4)), None);

    // Slice reads disagree with the memory world, so they are easy to tell apart.
    assert_eq!(editor.get_block_global(touched).unwrap(), stone());
    assert_eq!(world.block_reads(), 0);

    editor
        .place_block(touched, Block::new("minecraft:glass"), None)
        .unwrap();
    assert_eq!(editor.decay_at(touched), Some(true));
    assert_eq!(editor.decay_at(untouched), Some(false));

    assert_eq!(editor.get_block_global(touched).unwrap().id, "minecraft:glass");
    assert_eq!(world.block_reads(), 1);
    assert_eq!(editor.get_block_global(untouched).unwrap(), stone());
    assert_eq!(editor.get_biome_global(untouched).unwrap(), "minecraft:plains");
    assert_eq!(world.block_reads(), 1);
}

#[test]
fn reloading_clears_decay() {
    let world = MemoryTransport::new();
    world.world().chunks = Some(chunk_blob("minecraft:stone"));
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();

    assert!(matches!(
        editor.update_world_slice(),
        Err(InterfaceError::NoWorldSlice)
    ));

    editor
        .cache_world_slice(Some(Rect::new(0, 0, 16, 16)), &[])
        .unwrap();
    editor.place_block(pos(1, 1, 1), stone(), None).unwrap();
    assert_eq!(editor.decay_at(pos(1, 1, 1)), Some(true));

    let rect = editor.update_world_slice().unwrap().rect();
    assert_eq!(rect, Rect::new(0, 0, 16, 16));
    assert_eq!(editor.decay_at(pos(1, 1, 1)), Some(false));
}

#[test]
fn slice_defaults_to_the_build_area() {
    let world = MemoryTransport::new();
    world.world().chunks = Some(chunk_blob("minecraft:sandstone"));
    world.world().build_area = Some(BlockBox::new(pos(2, 60, 3), pos(8, 10, 8)));
    let editor = Editor::with_transport(config(), world.clone()).unwrap();

    let slice = editor.load_world_slice(None, &[]).unwrap();
    assert_eq!(slice.rect(), Rect::new(2, 3, 8, 8));
    assert!(world
        .requests()
        .contains(&Request::FetchChunks(Rect::new(0, 0, 1, 1))));
    assert!(editor.world_slice().is_none());
}

// ---------------------------------------------------------------------------
// Placement rules
// ---------------------------------------------------------------------------

#[test]
fn replace_filter_only_overwrites_listed_ids() {
    let world = MemoryTransport::new();
    world.set_block(pos(0, 64, 0), stone());
    world.set_block(pos(1, 64, 0), Block::new("minecraft:dirt"));
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();

    let placed = editor
        .place_blocks(row(2), Block::new("minecraft:glass"), Some(&["minecraft:stone"]))
        .unwrap();

    assert!(placed);
    assert_eq!(world.block(pos(0, 64, 0)).id, "minecraft:glass");
    assert_eq!(world.block(pos(1, 64, 0)).id, "minecraft:dirt");
}

#[test]
fn seeded_palettes_repeat() {
    let palette = vec![
        Block::new("minecraft:stone"),
        Block::new("minecraft:andesite"),
        Block::new("minecraft:cobblestone"),
    ];
    let place = |seed| {
        let world = MemoryTransport::new();
        let mut editor = Editor::with_transport(
            EditorConfig {
                seed: Some(seed),
                ..config()
            },
            world.clone(),
        )
        .unwrap();
        editor.place_blocks(row(30), palette.clone(), None).unwrap();
        drop(editor);
        row(30).into_iter().map(|p| world.block(p).id).collect::<Vec<_>>()
    };

    let first = place(11);
    assert_eq!(first, place(11));
    let distinct: HashSet<_> = first.iter().collect();
    assert!(distinct.len() > 1);
}

#[test]
fn empty_palette_and_nothing_are_no_ops() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();

    assert!(editor.place_block(pos(0, 0, 0), Vec::<Block>::new(), None).unwrap());
    assert!(editor.place_block(pos(0, 0, 0), Block::nothing(), None).unwrap());
    assert!(world.writes().is_empty());
}

#[test]
fn refused_direct_placement_returns_false() {
    let world = MemoryTransport::new();
    world.world().reject.insert(pos(0, 64, 0));
    let mut editor = Editor::with_transport(
        EditorConfig {
            caching: true,
            ..config()
        },
        world.clone(),
    )
    .unwrap();

    assert!(!editor.place_block(pos(0, 64, 0), stone(), None).unwrap());
    assert_eq!(editor.get_block_global(pos(0, 64, 0)).unwrap().id, "minecraft:air");
}

#[test]
fn refused_buffered_placements_show_up_in_the_report() {
    let world = MemoryTransport::new();
    world.world().reject.insert(pos(1, 64, 0));
    let mut editor = Editor::with_transport(buffered(16), world.clone()).unwrap();

    for p in row(3) {
        editor.place_block(p, stone(), None).unwrap();
    }
    let FlushOutcome::Sent(report) = editor.flush_buffer().unwrap() else {
        panic!("expected a synchronous flush");
    };

    assert_eq!(report.placed, 2);
    assert!(!report.is_clean());
    assert_eq!(report.rejections[0].position, Some(pos(1, 64, 0)));
    assert_eq!(report.rejections[0].message, "refused");
}

#[test]
fn short_placement_results_fail_the_flush() {
    let world = MemoryTransport::new();
    world.world().short_statuses = true;
    let mut editor = Editor::with_transport(buffered(16), world.clone()).unwrap();

    for p in row(2) {
        editor.place_block(p, stone(), None).unwrap();
    }

    match editor.flush_buffer() {
        Err(InterfaceError::Malformed { endpoint, reason }) => {
            assert_eq!(endpoint, "memory");
            assert!(reason.contains("1 placement results for 2 blocks"), "{reason}");
        }
        other => panic!("expected a malformed reply, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

#[test]
fn local_frame_orients_writes_and_reads() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();
    editor.set_transform(Transform::new(pos(100, 0, 100), 1, Flip::NONE));
    let local = pos(2, 64, 0);
    let global = editor.transform().apply(local);
    assert_eq!(global, pos(100, 64, 102));

    let stairs = Block::new("minecraft:oak_stairs").with_state("facing", "north");
    editor.place_block(local, stairs.clone(), None).unwrap();

    assert_eq!(world.block(global).states["facing"], "east");
    assert_eq!(editor.get_block(local).unwrap(), stairs);
}

#[test]
fn transform_guard_restores_on_drop() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();
    editor.set_transform(Transform::translate(pos(10, 0, 0)));

    {
        let mut inner = editor.push_transform(Transform::translate(pos(0, 5, 0)));
        assert_eq!(inner.transform().apply(BlockPos::ZERO), pos(10, 5, 0));
        inner.place_block(BlockPos::ZERO, stone(), None).unwrap();
    }

    assert_eq!(editor.transform(), Transform::translate(pos(10, 0, 0)));
    assert_eq!(world.block(pos(10, 5, 0)), stone());
}

#[test]
fn positioned_commands_use_the_translated_position() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();
    editor.set_transform(Transform::translate(pos(10, 0, -4)));

    let statuses = editor
        .run_command("setblock ~ ~ ~ stone", Some(pos(1, 2, 3)), false)
        .unwrap();

    assert!(statuses[0].success);
    assert_eq!(
        world.requests(),
        vec![Request::Commands(
            "execute positioned 11 2 -1 run setblock ~ ~ ~ stone".into()
        )]
    );
}

// ---------------------------------------------------------------------------
// Build area and connection
// ---------------------------------------------------------------------------

#[test]
fn build_area_round_trips() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(config(), world.clone()).unwrap();

    assert!(matches!(
        editor.get_build_area(),
        Err(InterfaceError::BuildAreaNotSet)
    ));
    let area = BlockBox::new(pos(-16, 60, 32), pos(64, 20, 48));
    assert_eq!(editor.set_build_area(area).unwrap(), area);
    assert_eq!(editor.minecraft_version().unwrap(), "1.20.2");
    editor.check_connection().unwrap();
}

// ---------------------------------------------------------------------------
// Multithreaded flushing and teardown
// ---------------------------------------------------------------------------

#[test]
fn worker_flushes_all_land_after_awaiting() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(
        EditorConfig {
            flush_workers: Some(2),
            ..buffered(1)
        },
        world.clone(),
    )
    .unwrap();

    for p in row(5) {
        editor.place_block(p, stone(), None).unwrap();
    }
    assert!(matches!(editor.flush_buffer().unwrap(), FlushOutcome::Queued(_)));
    assert!(editor.await_flushes(None).is_empty());

    let results = editor.take_flush_results();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|(_, r)| r.as_ref().is_ok_and(|r| r.placed == 1)));
    for p in row(5) {
        assert_eq!(world.block(p), stone());
    }
}

#[test]
fn dropping_the_editor_flushes_the_buffer() {
    let world = MemoryTransport::new();
    {
        let mut editor = Editor::with_transport(buffered(16), world.clone()).unwrap();
        editor.place_block(pos(7, 64, 7), stone(), None).unwrap();
        editor.run_command("say bye", None, true).unwrap();
    }

    assert_eq!(world.block(pos(7, 64, 7)), stone());
    assert_eq!(
        world.requests().last(),
        Some(&Request::Commands("say bye".into()))
    );
}

#[test]
fn close_reports_the_final_flush() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(
        EditorConfig {
            flush_workers: Some(1),
            ..buffered(2)
        },
        world.clone(),
    )
    .unwrap();

    for p in row(3) {
        editor.place_block(p, stone(), None).unwrap();
    }
    let report = editor.close().unwrap();

    assert_eq!(report.placed, 1);
    assert_eq!(world.writes().len(), 2);
}

#[test]
fn uncollected_worker_results_are_capped() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(
        EditorConfig {
            flush_workers: Some(1),
            ..buffered(1)
        },
        world.clone(),
    )
    .unwrap();

    let total = RETAINED_RESULTS as i64 + 44;
    for p in row(total) {
        editor.place_block(p, stone(), None).unwrap();
    }
    editor.flush_buffer().unwrap();
    assert!(editor.await_flushes(None).is_empty());

    let ids: Vec<FlushId> = editor.take_flush_results().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, (44..total as FlushId).collect::<Vec<_>>());
    assert_eq!(world.writes().len(), total as usize);
}

#[test]
fn changing_workers_hands_back_uncollected_results() {
    let world = MemoryTransport::new();
    let mut editor = Editor::with_transport(
        EditorConfig {
            flush_workers: Some(1),
            ..buffered(1)
        },
        world.clone(),
    )
    .unwrap();

    for p in row(3) {
        editor.place_block(p, stone(), None).unwrap();
    }
    editor.flush_buffer().unwrap();

    let results = editor.set_flush_workers(Some(2)).unwrap();
    assert_eq!(results.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert!(editor.take_flush_results().is_empty());

    editor.place_block(pos(9, 64, 9), stone(), None).unwrap();
    assert_eq!(editor.flush_buffer().unwrap(), FlushOutcome::Queued(3));
    assert!(editor.set_flush_workers(Some(2)).unwrap().is_empty());
    editor.await_flushes(None);
    assert_eq!(editor.set_flush_workers(None).unwrap().len(), 1);
}

#[test]
fn bounded_await_returns_flushes_still_running() {
    let world = MemoryTransport::new();
    let gate = GatedTransport::closed(world.clone());
    let mut editor = Editor::with_transport(
        EditorConfig {
            flush_workers: Some(1),
            ..buffered(16)
        },
        gate.clone(),
    )
    .unwrap();

    editor.place_block(pos(0, 64, 0), stone(), None).unwrap();
    let FlushOutcome::Queued(id) = editor.flush_buffer().unwrap() else {
        panic!("expected a queued flush");
    };

    assert_eq!(editor.await_flushes(Some(Duration::from_millis(10))), vec![id]);
    assert_eq!(editor.pending_flushes(), 1);
    assert!(world.writes().is_empty());

    gate.open();
    assert!(editor.await_flushes(Some(Duration::from_secs(5))).is_empty());
    assert_eq!(editor.pending_flushes(), 0);
    let results = editor.take_flush_results();
    assert_eq!(results.len(), 1);
    assert!(matches!(&results[0], (done, Ok(r)) if *done == id && r.placed == 1));
}

#[test]
fn dropping_waits_for_queued_flushes_then_sends_the_rest_here() {
    let world = MemoryTransport::new();
    let gate = GatedTransport::closed(world.clone());
    let mut editor = Editor::with_transport(
        EditorConfig {
            flush_workers: Some(1),
            ..buffered(16)
        },
        gate.clone(),
    )
    .unwrap();
    let (a, b) = (pos(0, 64, 0), pos(1, 64, 0));
    let glass = Block::new("minecraft:glass");

    editor.place_block(a, glass.clone(), None).unwrap();
    assert!(matches!(editor.flush_buffer().unwrap(), FlushOutcome::Queued(_)));
    editor.place_block(a, stone(), None).unwrap();
    editor.place_block(b, stone(), None).unwrap();

    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };
    drop(editor);
    opener.join().unwrap();

    assert_eq!(
        world.writes(),
        vec![vec![(a, glass)], vec![(a, stone()), (b, stone())]]
    );
    assert_eq!(world.block(a), stone());
    let writers = gate.writer_threads();
    assert_eq!(writers.len(), 2);
    assert_ne!(writers[0], thread::current().id());
    assert_eq!(writers[1], thread::current().id());
}
