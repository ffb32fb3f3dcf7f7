//! End-to-end scenarios exercising the engine layers together, one per
//! testable property: rest/note gating, slide portamento, automation
//! option-lane clamping, song loop wrap, pool exhaustion, and scene
//! JSON round-tripping.

use pocketacid_core::automation::{AutomationLane, AutomationNodePool};
use pocketacid_core::pattern::drum::DrumVoice;
use pocketacid_core::pattern::song::SongPosition;
use pocketacid_core::scene::dump::dump_scene;
use pocketacid_core::scene::observer::SceneObserver;
use pocketacid_core::scene::Scene;
use pocketacid_core::sequencer::{note_to_freq, Sequencer};
use pocketacid_core::voice::{DrumMachine, SynthVoice};

fn harness() -> (Sequencer, Scene, [SynthVoice; 2], DrumMachine) {
    let seq = Sequencer::new(22_050.0, 120.0);
    let scene = Scene::new();
    let synths = [SynthVoice::new(22_050.0), SynthVoice::new(22_050.0)];
    let drum = DrumMachine::new(22_050.0);
    (seq, scene, synths, drum)
}

/// A. Rest then note: step 0 is a rest, step 4 holds note 36. The voice
/// must stay silent through steps 0-3 and gate on exactly at step 4.
#[test]
fn rest_then_note_gates_on_at_step_four_and_decays() {
    let (mut seq, mut scene, mut synths, mut drum) = harness();
    scene.synth_a_banks[0].patterns[0].steps[0].note = -1;
    scene.synth_a_banks[0].patterns[0].steps[4].note = 36;
    seq.start(&mut scene);

    let samples_per_step = (22_050.0_f32 * 60.0 / (120.0 * 4.0)).max(1.0);
    let mut peak_env = 0.0_f32;
    let mut saw_gate_on = false;
    for i in 0..(samples_per_step as usize * 20) {
        seq.tick_sample(&mut scene, &mut synths, &mut drum);
        let out = synths[0].process().abs();
        let step = seq.current_step();
        if step < 4 {
            assert!(out < 0.05, "voice should be silent before step 4, got {out} at sample {i}");
        }
        if step >= 4 && synths[0].is_gated() {
            saw_gate_on = true;
            peak_env = peak_env.max(out);
        }
    }
    assert!(saw_gate_on, "voice never gated on at/after step 4");
    assert!(peak_env > 0.0);
}

/// B. Slide continuity: two consecutive slide notes must not jump in
/// frequency at the boundary, and must converge monotonically afterward.
#[test]
fn slide_converges_monotonically_without_a_jump() {
    let mut voice = SynthVoice::new(22_050.0);
    voice.start_note(note_to_freq(48), false, true, 100);
    for _ in 0..200 {
        voice.process();
    }
    let freq_before_boundary = voice.freq();

    voice.start_note(note_to_freq(60), false, true, 100);
    let freq_at_boundary = voice.freq();
    let total_span = (note_to_freq(60) - note_to_freq(48)).abs();
    assert!(
        (freq_at_boundary - freq_before_boundary).abs() / total_span < 0.2,
        "slide start should not discontinuously jump more than 20% of the interval"
    );

    let mut prev_diff = (note_to_freq(60) - voice.freq()).abs();
    for _ in 0..500 {
        voice.process();
        let diff = (note_to_freq(60) - voice.freq()).abs();
        assert!(diff <= prev_diff + 1e-6, "slide frequency must converge monotonically");
        prev_diff = diff;
    }
    assert!(prev_diff < total_span * 0.01, "slide should have nearly reached the target frequency");
}

/// C. Automation clamp on options: shrinking `optionLabels` to 2 entries
/// must clamp every existing node's y into `[0, optionCount-1]` and switch
/// evaluation to step-hold (no interpolation).
#[test]
fn shrinking_option_lane_clamps_existing_nodes() {
    let mut pool = AutomationNodePool::new(64);
    let mut lane = AutomationLane::new();
    lane.set_options(&mut pool, &["lp1", "acid", "moog"]);
    assert!(lane.append_node(&mut pool, 0, 255));
    assert!(lane.append_node(&mut pool, 15, 0));

    lane.set_options(&mut pool, &["lp1", "acid"]);
    for node in lane.nodes_for_dump(&pool) {
        assert!(node.y <= 1, "node y={} should be clamped to the new option count", node.y);
    }
    assert_eq!(lane.evaluate(&pool, 0.0), 1);
    assert_eq!(lane.evaluate(&pool, 15.0), 0);
    // Step-hold: the midpoint must equal one endpoint exactly, not an
    // interpolated in-between value (there is none between 0 and 1 anyway,
    // but the rule forbids a fractional evaluation entirely).
    let mid = lane.evaluate(&pool, 7.5);
    assert!(mid == 0 || mid == 1);
}

/// D. Song loop wrap: length 8, loop range [2,5], starting at bar 2, must
/// walk 2,3,4,5,2,3,4,5 over eight bars.
#[test]
fn song_loop_wraps_in_exact_sequence() {
    let (mut seq, mut scene, mut synths, mut drum) = harness();
    scene.active_song_mut().length = 8;
    scene.loop_mode = true;
    scene.set_loop_range(2, 5);
    scene.song_position = 2;
    scene.song_mode = true;
    seq.start(&mut scene);

    let samples_per_bar = (seq_samples_per_step(&seq) * 16.0).ceil() as usize;
    let mut positions = vec![scene.song_position];
    for _ in 0..8 {
        for _ in 0..samples_per_bar {
            seq.tick_sample(&mut scene, &mut synths, &mut drum);
        }
        positions.push(scene.song_position);
    }
    assert_eq!(positions, vec![2, 3, 4, 5, 2, 3, 4, 5, 2]);
}

fn seq_samples_per_step(seq: &Sequencer) -> f32 {
    // `samples_per_step` is private; rebuild the same formula the sequencer
    // derives from its own (sample_rate, bpm), both observable here.
    22_050.0 * 60.0 / (seq.bpm() * 4.0)
}

/// E. Pool exhaustion: appending to an empty lane against a fully
/// allocated pool must fail without touching the lane.
#[test]
fn append_fails_silently_when_pool_is_exhausted() {
    let mut pool = AutomationNodePool::new(4);
    assert!(pool.reserve_block(4).is_some());

    let mut lane = AutomationLane::new();
    assert!(!lane.append_node(&mut pool, 0, 128));
    assert_eq!(lane.len(), 0);
    assert!(lane.is_empty());
}

/// F. JSON round-trip: dumping and reloading a scene must preserve bpm,
/// song length, drum hits across every sequenced voice, and automation
/// node counts per lane.
#[test]
fn scene_round_trips_every_recognized_field() {
    let mut scene = Scene::new();
    scene.bpm = 140.0;
    scene.active_song_mut().length = 5;
    scene.active_song_mut().positions[0] = SongPosition { patterns: [1, -1, 2, -1] };
    for &voice in &[DrumVoice::Kick, DrumVoice::Snare, DrumVoice::ClosedHat] {
        scene.drum_banks[0].patterns[0].voice_mut(voice).steps[0].hit = true;
    }
    scene.synth_a_banks[0]
        .patterns[0]
        .lane_mut(pocketacid_core::pattern::synth::SynthParamId::Cutoff)
        .append_node(&mut scene.automation_pool, 0, 200);
    scene.synth_a_banks[0]
        .patterns[0]
        .lane_mut(pocketacid_core::pattern::synth::SynthParamId::Cutoff)
        .append_node(&mut scene.automation_pool, 10, 50);

    let json = dump_scene(&scene);
    let reloaded = SceneObserver::load(&json).expect("dumped scene must parse");

    assert_eq!(reloaded.bpm, 140.0);
    assert_eq!(reloaded.songs[0].length, 5);
    assert_eq!(reloaded.songs[0].positions[0].patterns, [1, -1, 2, -1]);
    for &voice in &[DrumVoice::Kick, DrumVoice::Snare, DrumVoice::ClosedHat] {
        assert!(reloaded.drum_banks[0].patterns[0].voice(voice).steps[0].hit);
    }
    let lane = reloaded.synth_a_banks[0].patterns[0].lane(pocketacid_core::pattern::synth::SynthParamId::Cutoff);
    assert_eq!(lane.nodes_for_dump(&reloaded.automation_pool).len(), 2);
}
