//! Scene -> JSON dump (spec §4.11/§6), the inverse of `observer`. Builds a
//! `serde_json::Value` tree and serializes it; dumps are infrequent
//! (save/export, not per-audio-callback), so the streaming discipline the
//! observer applies to ingest isn't needed on the way out.
//!
//! Grounded on the `dumpScene`/`toJson` family in `scenes.cpp`: every field
//! the observer recognizes on load has a matching writer here, using the
//! same key names, so `dump_scene(&scene)` parsed back through
//! `SceneObserver::load` reproduces the scene on every recognized key
//! (spec invariant 6).

use serde_json::{json, Value};

use super::Scene;
use crate::automation::AutomationLane;
use crate::pattern::drum::{DrumParamId, DrumPatternSet, DRUM_VOICE_COUNT};
use crate::pattern::song::{Song, SongTrack};
use crate::pattern::synth::{SynthParamId, SynthPattern};
use crate::pattern::Bank;

pub fn dump_scene(scene: &Scene) -> String {
    to_value(scene).to_string()
}

pub fn dump_scene_pretty(scene: &Scene) -> String {
    serde_json::to_string_pretty(&to_value(scene)).unwrap_or_default()
}

fn to_value(scene: &Scene) -> Value {
    json!({
        "drumBanks": drum_banks_value(scene),
        "synthABanks": synth_banks_value(&scene.synth_a_banks, scene),
        "synthBBanks": synth_banks_value(&scene.synth_b_banks, scene),
        "songs": songs_value(&scene.songs),
        "state": state_value(scene),
    })
}

fn drum_banks_value(scene: &Scene) -> Value {
    Value::Array(
        scene
            .drum_banks
            .iter()
            .map(|bank| drum_bank_value(bank, scene))
            .collect(),
    )
}

fn drum_bank_value(bank: &Bank<DrumPatternSet>, scene: &Scene) -> Value {
    Value::Array(
        bank.patterns
            .iter()
            .map(|set| drum_pattern_set_value(set, scene))
            .collect(),
    )
}

fn drum_pattern_set_value(set: &DrumPatternSet, scene: &Scene) -> Value {
    let voices: Vec<Value> = set
        .voices
        .iter()
        .take(DRUM_VOICE_COUNT)
        .map(|pattern| {
            Value::Array(
                pattern
                    .steps
                    .iter()
                    .map(|step| Value::Bool(step.hit))
                    .collect(),
            )
        })
        .collect();
    json!({
        "voices": voices,
        "accent": Vec::from(set.accents),
        "automation": [automation_lane_value(set.lane(DrumParamId::MainVolume), scene)],
    })
}

fn synth_banks_value(banks: &[Bank<SynthPattern>], scene: &Scene) -> Value {
    Value::Array(
        banks
            .iter()
            .map(|bank| {
                Value::Array(
                    bank.patterns
                        .iter()
                        .map(|pattern| synth_pattern_value(pattern, scene))
                        .collect(),
                )
            })
            .collect(),
    )
}

fn synth_pattern_value(pattern: &SynthPattern, scene: &Scene) -> Value {
    let steps: Vec<Value> = pattern
        .steps
        .iter()
        .map(|step| {
            json!({
                "note": step.note,
                "slide": step.slide,
                "accent": step.accent,
                "fx": step.fx,
                "fxp": step.fx_param,
                "prb": step.probability,
            })
        })
        .collect();
    let lane_ids = [
        SynthParamId::Cutoff,
        SynthParamId::Resonance,
        SynthParamId::EnvAmount,
        SynthParamId::EnvDecay,
        SynthParamId::OscType,
    ];
    let automation: Vec<Value> = lane_ids
        .iter()
        .map(|&id| automation_lane_value(pattern.lane(id), scene))
        .collect();
    json!({ "steps": steps, "automation": automation })
}

fn automation_lane_value(lane: &AutomationLane, scene: &Scene) -> Value {
    let nodes: Vec<Value> = lane
        .nodes_for_dump(&scene.automation_pool)
        .iter()
        .map(|n| json!({ "x": n.x, "y": n.y }))
        .collect();
    json!({
        "enabled": lane.enabled,
        "options": lane.option_labels(),
        "nodes": nodes,
    })
}

fn songs_value(songs: &[Song]) -> Value {
    Value::Array(songs.iter().map(song_value).collect())
}

fn song_value(song: &Song) -> Value {
    let positions: Vec<Value> = song
        .positions
        .iter()
        .take(song.length)
        .map(|pos| {
            json!({
                "a": pos.get(SongTrack::SynthA),
                "b": pos.get(SongTrack::SynthB),
                "drums": pos.get(SongTrack::Drums),
                "voice": pos.get(SongTrack::Voice),
            })
        })
        .collect();
    json!({
        "length": song.length,
        "reverse": song.reverse,
        "positions": positions,
    })
}

fn state_value(scene: &Scene) -> Value {
    json!({
        "drumPatternIndex": scene.drum_pattern_index,
        "drumBankIndex": scene.drum_bank_index,
        "drumEngine": scene.drum_engine,
        "synthPatternIndex": scene.synth_pattern_index,
        "synthBankIndex": scene.synth_bank_index,
        "mute": {
            "drums": Vec::from(scene.mute.drums),
            "synth": scene.mute.synth,
        },
        "synthDistortion": scene.synth_distortion,
        "synthDelay": scene.synth_delay,
        "synthParams": scene.synth_params.to_vec(),
        "bpm": scene.bpm,
        "songMode": scene.song_mode,
        "songPosition": scene.song_position,
        "loopMode": scene.loop_mode,
        "loopStart": scene.loop_start,
        "loopEnd": scene.loop_end,
        "activeSongSlot": scene.active_song_slot,
        "masterVolume": scene.master_volume,
        "trackVolumes": Vec::from(scene.track_volumes),
        "tape": scene.tape,
        "vocal": scene.vocal,
        "feel": scene.feel,
        "genre": scene.genre,
        "led": scene.led,
        "drumFX": scene.drum_fx,
        "samplerPads": scene.sampler_pads,
        "customPhrases": scene.custom_phrases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::observer::SceneObserver;

    #[test]
    fn dump_then_load_round_trips_bpm() {
        let mut scene = Scene::new();
        scene.set_bpm(133.0);
        scene.drum_engine = "909".to_string();
        let json = dump_scene(&scene);
        let reloaded = SceneObserver::load(&json).expect("valid scene");
        assert_eq!(reloaded.bpm, 133.0);
        assert_eq!(reloaded.drum_engine, "909");
    }

    #[test]
    fn dump_then_load_round_trips_drum_hits() {
        let mut scene = Scene::new();
        scene.drum_banks[0].patterns[0].voices[0].steps[3].hit = true;
        let json = dump_scene(&scene);
        let reloaded = SceneObserver::load(&json).expect("valid scene");
        assert!(reloaded.drum_banks[0].patterns[0].voices[0].steps[3].hit);
        assert!(!reloaded.drum_banks[0].patterns[0].voices[0].steps[0].hit);
    }

    #[test]
    fn dump_then_load_round_trips_automation_nodes() {
        let mut scene = Scene::new();
        {
            let pool = &mut scene.automation_pool;
            scene.drum_banks[0].patterns[0]
                .lane_mut(DrumParamId::MainVolume)
                .append_node(pool, 0, 255);
        }
        let json = dump_scene(&scene);
        let reloaded = SceneObserver::load(&json).expect("valid scene");
        let lane = reloaded.drum_banks[0].patterns[0].lane(DrumParamId::MainVolume);
        assert_eq!(lane.len(), 1);
        assert_eq!(lane.evaluate(&reloaded.automation_pool, 0.0), 255);
    }
}
