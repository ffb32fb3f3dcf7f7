//! Path-stack scene observer (spec §4.11/§6), ported from the path-deducing
//! state machine in `scenes.cpp` (`deduceObjectPath`/`deduceArrayPath` and
//! friends). Drives a `JsonStreamParser` and rebuilds a `Scene` in place
//! without ever materializing the whole document.
//!
//! The large, performance-relevant containers (`drumBanks`, `synthABanks`,
//! `synthBBanks`, `songs`) are streamed directly into the scene's own
//! arrays/lanes as their events arrive. The small domain objects in `state`
//! (`tape`, `vocal`, `feel`, `genre`, `led`, `drumFX`, `samplerPads`,
//! `customPhrases`) are bounded in size, so their subtree is folded into a
//! `serde_json::Value` by a generic event-to-value reducer and then decoded
//! — still one pass over the token stream, just without a bespoke path rule
//! per leaf key.
//!
//! Any of {unknown required container, index out of bounds, stack overflow,
//! parser-level syntax error, trailing non-whitespace} sets `had_error` and
//! aborts; the caller discards the partially built scene (spec §6 failure
//! model).

use serde_json::Value;

use super::json_parser::{JsonEvent, JsonNumber, JsonStreamParser};
use super::{MuteState, Scene, SynthParamSnapshot};
use crate::pattern::drum::{DrumParamId, DRUM_VOICE_COUNT};
use crate::pattern::song::{SongTrack, SONG_TRACK_COUNT};
use crate::pattern::synth::SynthParamId;

const MAX_OBSERVER_DEPTH: usize = 16;

pub struct SceneObserver<'p, 's> {
    parser: &'p mut JsonStreamParser<'s>,
    depth: usize,
    had_error: bool,
}

impl<'p, 's> SceneObserver<'p, 's> {
    pub fn new(parser: &'p mut JsonStreamParser<'s>) -> Self {
        Self {
            parser,
            depth: 0,
            had_error: false,
        }
    }

    fn fail(&mut self) {
        self.had_error = true;
    }

    fn next(&mut self) -> Option<JsonEvent> {
        if self.had_error {
            return None;
        }
        match self.parser.next_event() {
            Ok(ev) => Some(ev),
            Err(_) => {
                self.fail();
                None
            }
        }
    }

    fn enter(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_OBSERVER_DEPTH {
            self.fail();
            false
        } else {
            true
        }
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Loads a scene, returning `None` (rather than panicking or throwing)
    /// on any ingest failure, per spec §7's "one externally visible result
    /// mode".
    pub fn load(json: &str) -> Option<Scene> {
        let mut parser = JsonStreamParser::new(json);
        let mut observer = SceneObserver::new(&mut parser);
        let mut scene = Scene::new();
        observer.load_root(&mut scene);
        if observer.had_error {
            None
        } else {
            Some(scene)
        }
    }

    fn load_root(&mut self, scene: &mut Scene) {
        match self.next() {
            Some(JsonEvent::ObjectStart) => {}
            _ => return self.fail(),
        }
        if !self.enter() {
            return;
        }
        loop {
            match self.next() {
                Some(JsonEvent::ObjectEnd) => break,
                Some(JsonEvent::ObjectKey(key)) => self.dispatch_root_key(&key, scene),
                _ => return self.fail(),
            }
            if self.had_error {
                return;
            }
        }
        self.leave();
        match self.next() {
            Some(JsonEvent::Eof) => {}
            _ => self.fail(),
        }
    }

    fn dispatch_root_key(&mut self, key: &str, scene: &mut Scene) {
        match key {
            "drumBanks" => self.load_drum_banks(scene),
            "synthABanks" => self.load_synth_banks(scene, 0),
            "synthBBanks" => self.load_synth_banks(scene, 1),
            "songs" => self.load_songs(scene),
            "state" => self.load_state(scene),
            _ => self.skip_value(),
        }
    }

    // ---- generic helpers -------------------------------------------------

    /// Consumes and discards one complete value (object/array/scalar),
    /// for an unrecognized key.
    fn skip_value(&mut self) {
        let ev = match self.next() {
            Some(ev) => ev,
            None => return,
        };
        match ev {
            JsonEvent::ObjectStart | JsonEvent::ArrayStart => {
                if !self.enter() {
                    return;
                }
                let mut open = 1i32;
                while open > 0 {
                    match self.next() {
                        Some(JsonEvent::ObjectStart) | Some(JsonEvent::ArrayStart) => open += 1,
                        Some(JsonEvent::ObjectEnd) | Some(JsonEvent::ArrayEnd) => open -= 1,
                        Some(_) => {}
                        None => return,
                    }
                }
                self.leave();
            }
            _ => {}
        }
    }

    /// Folds one complete value's event subtree into a `serde_json::Value`.
    /// Used for bounded domain objects where a per-field path rule isn't
    /// worth the ceremony.
    fn value_from_events(&mut self) -> Option<Value> {
        let ev = self.next()?;
        self.value_from_event(ev)
    }

    fn value_from_event(&mut self, ev: JsonEvent) -> Option<Value> {
        match ev {
            JsonEvent::Null => Some(Value::Null),
            JsonEvent::Bool(b) => Some(Value::Bool(b)),
            JsonEvent::Number(JsonNumber::Int(i)) => Some(Value::from(i)),
            JsonEvent::Number(JsonNumber::Float(f)) => Some(Value::from(f)),
            JsonEvent::String(s) => Some(Value::String(s)),
            JsonEvent::ArrayStart => {
                if !self.enter() {
                    return None;
                }
                let mut items = Vec::new();
                loop {
                    match self.next()? {
                        JsonEvent::ArrayEnd => break,
                        other => items.push(self.value_from_event(other)?),
                    }
                }
                self.leave();
                Some(Value::Array(items))
            }
            JsonEvent::ObjectStart => {
                if !self.enter() {
                    return None;
                }
                let mut map = serde_json::Map::new();
                loop {
                    match self.next()? {
                        JsonEvent::ObjectEnd => break,
                        JsonEvent::ObjectKey(k) => {
                            let v = self.value_from_events()?;
                            map.insert(k, v);
                        }
                        _ => {
                            self.fail();
                            return None;
                        }
                    }
                }
                self.leave();
                Some(Value::Object(map))
            }
            _ => {
                self.fail();
                None
            }
        }
    }

    fn expect_array_start(&mut self) -> bool {
        matches!(self.next(), Some(JsonEvent::ArrayStart))
    }

    fn read_bool(&mut self) -> Option<bool> {
        match self.next()? {
            JsonEvent::Bool(b) => Some(b),
            _ => {
                self.fail();
                None
            }
        }
    }

    fn read_number_f32(&mut self) -> Option<f32> {
        match self.next()? {
            JsonEvent::Number(JsonNumber::Int(i)) => Some(i as f32),
            JsonEvent::Number(JsonNumber::Float(f)) => Some(f as f32),
            _ => {
                self.fail();
                None
            }
        }
    }

    fn read_number_usize(&mut self) -> Option<usize> {
        match self.next()? {
            JsonEvent::Number(JsonNumber::Int(i)) => Some(i.max(0) as usize),
            JsonEvent::Number(JsonNumber::Float(f)) => Some(f.max(0.0) as usize),
            _ => {
                self.fail();
                None
            }
        }
    }

    fn read_number_i16(&mut self) -> Option<i16> {
        match self.next()? {
            JsonEvent::Number(JsonNumber::Int(i)) => Some(i as i16),
            JsonEvent::Number(JsonNumber::Float(f)) => Some(f as i16),
            _ => {
                self.fail();
                None
            }
        }
    }

    fn read_string(&mut self) -> Option<String> {
        match self.next()? {
            JsonEvent::String(s) => Some(s),
            _ => {
                self.fail();
                None
            }
        }
    }

    /// Reads a fixed-length JSON array of bools into `out`, ignoring extra
    /// elements and leaving missing ones at their existing (default) value.
    fn read_bool_array(&mut self, out: &mut [bool]) {
        if !self.expect_array_start() {
            return self.fail();
        }
        if !self.enter() {
            return;
        }
        let mut i = 0usize;
        loop {
            match self.next() {
                Some(JsonEvent::ArrayEnd) => break,
                Some(JsonEvent::Bool(b)) => {
                    if let Some(slot) = out.get_mut(i) {
                        *slot = b;
                    }
                    i += 1;
                }
                _ => return self.fail(),
            }
        }
        self.leave();
    }

    // ---- drum banks --------------------------------------------------------

    fn load_drum_banks(&mut self, scene: &mut Scene) {
        if !self.expect_array_start() {
            return self.fail();
        }
        if !self.enter() {
            return;
        }
        let mut bank_idx = 0usize;
        loop {
            match self.next() {
                Some(JsonEvent::ArrayEnd) => break,
                Some(JsonEvent::ArrayStart) => {
                    if !self.enter() {
                        return;
                    }
                    let mut pattern_idx = 0usize;
                    loop {
                        match self.next() {
                            Some(JsonEvent::ArrayEnd) => break,
                            Some(JsonEvent::ObjectStart) => {
                                self.load_drum_pattern_set(scene, bank_idx, pattern_idx);
                                pattern_idx += 1;
                            }
                            _ => return self.fail(),
                        }
                        if self.had_error {
                            return;
                        }
                    }
                    self.leave();
                    bank_idx += 1;
                }
                _ => return self.fail(),
            }
        }
        self.leave();
    }

    fn load_drum_pattern_set(&mut self, scene: &mut Scene, bank_idx: usize, pattern_idx: usize) {
        if !self.enter() {
            return;
        }
        loop {
            let key = match self.next() {
                Some(JsonEvent::ObjectEnd) => break,
                Some(JsonEvent::ObjectKey(k)) => k,
                _ => return self.fail(),
            };
            match key.as_str() {
                "voices" => {
                    if !self.expect_array_start() {
                        return self.fail();
                    }
                    if !self.enter() {
                        return;
                    }
                    let mut voice_idx = 0usize;
                    loop {
                        match self.next() {
                            Some(JsonEvent::ArrayEnd) => break,
                            Some(JsonEvent::ArrayStart) => {
                                if !self.enter() {
                                    return;
                                }
                                let mut hits = [false; 16];
                                let mut i = 0usize;
                                loop {
                                    match self.next() {
                                        Some(JsonEvent::ArrayEnd) => break,
                                        Some(JsonEvent::Bool(b)) => {
                                            if let Some(slot) = hits.get_mut(i) {
                                                *slot = b;
                                            }
                                            i += 1;
                                        }
                                        _ => return self.fail(),
                                    }
                                }
                                self.leave();
                                if let (Some(bank), true) =
                                    (scene.drum_banks.get_mut(bank_idx), voice_idx < DRUM_VOICE_COUNT)
                                {
                                    if let Some(set) = bank.get_mut(pattern_idx) {
                                        for (step, hit) in set.voices[voice_idx].steps.iter_mut().zip(hits) {
                                            step.hit = hit;
                                        }
                                    }
                                }
                                voice_idx += 1;
                            }
                            _ => return self.fail(),
                        }
                        if self.had_error {
                            return;
                        }
                    }
                    self.leave();
                }
                "accent" => {
                    let mut accents = [false; 16];
                    self.read_bool_array(&mut accents);
                    if let Some(set) = scene.drum_banks.get_mut(bank_idx).and_then(|b| b.get_mut(pattern_idx)) {
                        set.accents = accents;
                    }
                }
                "automation" => {
                    if !self.expect_array_start() {
                        return self.fail();
                    }
                    if !self.enter() {
                        return;
                    }
                    let mut lane_idx = 0usize;
                    loop {
                        match self.next() {
                            Some(JsonEvent::ArrayEnd) => break,
                            Some(JsonEvent::ObjectStart) => {
                                let mut lane = crate::automation::AutomationLane::new();
                                self.load_automation_lane_body(&mut scene.automation_pool, &mut lane);
                                if lane_idx == 0 {
                                    if let Some(set) =
                                        scene.drum_banks.get_mut(bank_idx).and_then(|b| b.get_mut(pattern_idx))
                                    {
                                        *set.lane_mut(DrumParamId::MainVolume) = lane;
                                    }
                                }
                                lane_idx += 1;
                            }
                            _ => return self.fail(),
                        }
                        if self.had_error {
                            return;
                        }
                    }
                    self.leave();
                }
                _ => self.skip_value(),
            }
            if self.had_error {
                return;
            }
        }
        self.leave();
    }

    /// `load_automation_lane` assumes it still owns the `ObjectStart` event;
    /// this variant is entered right after that event has already been
    /// consumed by the caller's dispatch loop.
    fn load_automation_lane_body(
        &mut self,
        pool: &mut crate::automation::AutomationNodePool,
        lane: &mut crate::automation::AutomationLane,
    ) {
        lane.clear(pool);
        if !self.enter() {
            return;
        }
        loop {
            let key = match self.next() {
                Some(JsonEvent::ObjectEnd) => break,
                Some(JsonEvent::ObjectKey(k)) => k,
                _ => return self.fail(),
            };
            match key.as_str() {
                "enabled" => {
                    if let Some(b) = self.read_bool() {
                        lane.enabled = b;
                    }
                }
                "options" => {
                    let mut labels: Vec<String> = Vec::new();
                    if !self.expect_array_start() {
                        return self.fail();
                    }
                    if !self.enter() {
                        return;
                    }
                    loop {
                        match self.next() {
                            Some(JsonEvent::ArrayEnd) => break,
                            Some(JsonEvent::String(s)) => labels.push(s),
                            _ => return self.fail(),
                        }
                    }
                    self.leave();
                    let refs: Vec<&str> = labels.iter().map(|s| s.as_str()).collect();
                    lane.set_options(pool, &refs);
                }
                "nodes" => {
                    if !self.expect_array_start() {
                        return self.fail();
                    }
                    if !self.enter() {
                        return;
                    }
                    loop {
                        match self.next() {
                            Some(JsonEvent::ArrayEnd) => break,
                            Some(JsonEvent::ObjectStart) => {
                                if !self.enter() {
                                    return;
                                }
                                let (mut x, mut y) = (0u8, 0u8);
                                loop {
                                    match self.next() {
                                        Some(JsonEvent::ObjectEnd) => break,
                                        Some(JsonEvent::ObjectKey(k)) if k == "x" => {
                                            if let Some(v) = self.read_number_usize() {
                                                x = v.min(255) as u8;
                                            }
                                        }
                                        Some(JsonEvent::ObjectKey(k)) if k == "y" => {
                                            if let Some(v) = self.read_number_usize() {
                                                y = v.min(255) as u8;
                                            }
                                        }
                                        Some(JsonEvent::ObjectKey(_)) => self.skip_value(),
                                        _ => return self.fail(),
                                    }
                                }
                                self.leave();
                                lane.append_node(pool, x, y);
                            }
                            _ => return self.fail(),
                        }
                    }
                    self.leave();
                }
                _ => self.skip_value(),
            }
            if self.had_error {
                return;
            }
        }
        self.leave();
    }

    // ---- synth banks --------------------------------------------------------

    fn load_synth_banks(&mut self, scene: &mut Scene, synth_idx: usize) {
        if !self.expect_array_start() {
            return self.fail();
        }
        if !self.enter() {
            return;
        }
        let mut bank_idx = 0usize;
        loop {
            match self.next() {
                Some(JsonEvent::ArrayEnd) => break,
                Some(JsonEvent::ArrayStart) => {
                    if !self.enter() {
                        return;
                    }
                    let mut pattern_idx = 0usize;
                    loop {
                        match self.next() {
                            Some(JsonEvent::ArrayEnd) => break,
                            Some(JsonEvent::ObjectStart) => {
                                self.load_synth_pattern(scene, synth_idx, bank_idx, pattern_idx);
                                pattern_idx += 1;
                            }
                            _ => return self.fail(),
                        }
                        if self.had_error {
                            return;
                        }
                    }
                    self.leave();
                    bank_idx += 1;
                }
                _ => return self.fail(),
            }
        }
        self.leave();
    }

    fn load_synth_pattern(&mut self, scene: &mut Scene, synth_idx: usize, bank_idx: usize, pattern_idx: usize) {
        if !self.enter() {
            return;
        }
        loop {
            let key = match self.next() {
                Some(JsonEvent::ObjectEnd) => break,
                Some(JsonEvent::ObjectKey(k)) => k,
                _ => return self.fail(),
            };
            match key.as_str() {
                "steps" => {
                    if !self.expect_array_start() {
                        return self.fail();
                    }
                    if !self.enter() {
                        return;
                    }
                    let mut step_idx = 0usize;
                    loop {
                        match self.next() {
                            Some(JsonEvent::ArrayEnd) => break,
                            Some(JsonEvent::ObjectStart) => {
                                let step = self.load_synth_step();
                                self.write_synth_step(scene, synth_idx, bank_idx, pattern_idx, step_idx, step);
                                step_idx += 1;
                            }
                            _ => return self.fail(),
                        }
                        if self.had_error {
                            return;
                        }
                    }
                    self.leave();
                }
                "automation" => {
                    if !self.expect_array_start() {
                        return self.fail();
                    }
                    if !self.enter() {
                        return;
                    }
                    let ids = [
                        SynthParamId::Cutoff,
                        SynthParamId::Resonance,
                        SynthParamId::EnvAmount,
                        SynthParamId::EnvDecay,
                        SynthParamId::OscType,
                    ];
                    let mut lane_idx = 0usize;
                    loop {
                        match self.next() {
                            Some(JsonEvent::ArrayEnd) => break,
                            Some(JsonEvent::ObjectStart) => {
                                let mut lane = crate::automation::AutomationLane::new();
                                self.load_automation_lane_body(&mut scene.automation_pool, &mut lane);
                                if let Some(&id) = ids.get(lane_idx) {
                                    let bank = match synth_idx {
                                        0 => scene.synth_a_banks.get_mut(bank_idx),
                                        _ => scene.synth_b_banks.get_mut(bank_idx),
                                    };
                                    if let Some(pattern) = bank.and_then(|b| b.get_mut(pattern_idx)) {
                                        *pattern.lane_mut(id) = lane;
                                    }
                                }
                                lane_idx += 1;
                            }
                            _ => return self.fail(),
                        }
                        if self.had_error {
                            return;
                        }
                    }
                    self.leave();
                }
                _ => self.skip_value(),
            }
            if self.had_error {
                return;
            }
        }
        self.leave();
    }

    /// `{note, slide, accent, fx, fxp, prb}`.
    fn load_synth_step(&mut self) -> crate::pattern::synth::SynthStep {
        let mut step = crate::pattern::synth::SynthStep::default();
        if !self.enter() {
            return step;
        }
        loop {
            let key = match self.next() {
                Some(JsonEvent::ObjectEnd) => break,
                Some(JsonEvent::ObjectKey(k)) => k,
                _ => {
                    self.fail();
                    return step;
                }
            };
            match key.as_str() {
                "note" => {
                    if let Some(n) = self.read_number_i16() {
                        step.note = n.clamp(-1, 127) as i8;
                    }
                }
                "slide" => {
                    if let Some(b) = self.read_bool() {
                        step.slide = b;
                    }
                }
                "accent" => {
                    if let Some(b) = self.read_bool() {
                        step.accent = b;
                    }
                }
                "fx" => {
                    if let Some(n) = self.read_number_usize() {
                        step.fx = n.min(255) as u8;
                    }
                }
                "fxp" => {
                    if let Some(n) = self.read_number_usize() {
                        step.fx_param = n.min(255) as u8;
                    }
                }
                "prb" => {
                    if let Some(n) = self.read_number_usize() {
                        step.probability = n.min(255) as u8;
                    }
                }
                _ => self.skip_value(),
            }
            if self.had_error {
                return step;
            }
        }
        self.leave();
        step
    }

    fn write_synth_step(
        &mut self,
        scene: &mut Scene,
        synth_idx: usize,
        bank_idx: usize,
        pattern_idx: usize,
        step_idx: usize,
        step: crate::pattern::synth::SynthStep,
    ) {
        let bank = match synth_idx {
            0 => scene.synth_a_banks.get_mut(bank_idx),
            _ => scene.synth_b_banks.get_mut(bank_idx),
        };
        if let Some(pattern) = bank.and_then(|b| b.get_mut(pattern_idx)) {
            if let Some(slot) = pattern.steps.get_mut(step_idx) {
                *slot = step;
            }
        }
    }

    // ---- songs --------------------------------------------------------------

    fn load_songs(&mut self, scene: &mut Scene) {
        if !self.expect_array_start() {
            return self.fail();
        }
        if !self.enter() {
            return;
        }
        let mut song_idx = 0usize;
        loop {
            match self.next() {
                Some(JsonEvent::ArrayEnd) => break,
                Some(JsonEvent::ObjectStart) => {
                    self.load_song(scene, song_idx);
                    song_idx += 1;
                }
                _ => return self.fail(),
            }
            if self.had_error {
                return;
            }
        }
        self.leave();
    }

    fn load_song(&mut self, scene: &mut Scene, song_idx: usize) {
        if !self.enter() {
            return;
        }
        let mut length = None;
        let mut reverse = None;
        loop {
            let key = match self.next() {
                Some(JsonEvent::ObjectEnd) => break,
                Some(JsonEvent::ObjectKey(k)) => k,
                _ => return self.fail(),
            };
            match key.as_str() {
                "length" => length = self.read_number_usize(),
                "reverse" => reverse = self.read_bool(),
                "positions" => {
                    if !self.expect_array_start() {
                        return self.fail();
                    }
                    if !self.enter() {
                        return;
                    }
                    let mut pos_idx = 0usize;
                    loop {
                        match self.next() {
                            Some(JsonEvent::ArrayEnd) => break,
                            Some(JsonEvent::ObjectStart) => {
                                self.load_song_position(scene, song_idx, pos_idx);
                                pos_idx += 1;
                            }
                            _ => return self.fail(),
                        }
                        if self.had_error {
                            return;
                        }
                    }
                    self.leave();
                }
                _ => self.skip_value(),
            }
            if self.had_error {
                return;
            }
        }
        self.leave();
        if let Some(song) = scene.songs.get_mut(song_idx) {
            if let Some(l) = length {
                song.length = l.clamp(1, crate::pattern::song::SONG_LENGTH_MAX);
            }
            if let Some(r) = reverse {
                song.reverse = r;
            }
        }
    }

    fn load_song_position(&mut self, scene: &mut Scene, song_idx: usize, pos_idx: usize) {
        if !self.enter() {
            return;
        }
        let mut patterns = [-1i16; SONG_TRACK_COUNT];
        loop {
            let key = match self.next() {
                Some(JsonEvent::ObjectEnd) => break,
                Some(JsonEvent::ObjectKey(k)) => k,
                _ => return self.fail(),
            };
            let track = match key.as_str() {
                "a" => Some(SongTrack::SynthA),
                "b" => Some(SongTrack::SynthB),
                "drums" => Some(SongTrack::Drums),
                "voice" => Some(SongTrack::Voice),
                _ => None,
            };
            match track {
                Some(t) => {
                    if let Some(v) = self.read_number_i16() {
                        patterns[t as usize] = v;
                    }
                }
                None => self.skip_value(),
            }
            if self.had_error {
                return;
            }
        }
        self.leave();
        if let Some(song) = scene.songs.get_mut(song_idx) {
            if let Some(slot) = song.positions.get_mut(pos_idx) {
                slot.patterns = patterns;
            }
        }
    }

    // ---- state ----------------------------------------------------------

    fn load_state(&mut self, scene: &mut Scene) {
        if !matches!(self.next(), Some(JsonEvent::ObjectStart)) {
            return self.fail();
        }
        if !self.enter() {
            return;
        }
        loop {
            let key = match self.next() {
                Some(JsonEvent::ObjectEnd) => break,
                Some(JsonEvent::ObjectKey(k)) => k,
                _ => return self.fail(),
            };
            self.dispatch_state_key(&key, scene);
            if self.had_error {
                return;
            }
        }
        self.leave();
    }

    fn dispatch_state_key(&mut self, key: &str, scene: &mut Scene) {
        match key {
            "drumPatternIndex" => {
                if let Some(v) = self.read_number_usize() {
                    scene.drum_pattern_index = v;
                }
            }
            "drumBankIndex" => {
                if let Some(v) = self.read_number_usize() {
                    scene.drum_bank_index = v;
                }
            }
            "drumEngine" => {
                if let Some(s) = self.read_string() {
                    scene.drum_engine = s;
                }
            }
            "synthPatternIndex" => self.read_usize_pair(&mut scene.synth_pattern_index),
            "synthBankIndex" => self.read_usize_pair(&mut scene.synth_bank_index),
            "mute" => self.load_mute(scene),
            "synthDistortion" => self.read_bool_pair(&mut scene.synth_distortion),
            "synthDelay" => self.read_bool_pair(&mut scene.synth_delay),
            "synthParams" => self.load_synth_params(scene),
            "bpm" => {
                if let Some(v) = self.read_number_f32() {
                    scene.set_bpm(v);
                }
            }
            "songMode" => {
                if let Some(v) = self.read_bool() {
                    scene.song_mode = v;
                }
            }
            "songPosition" => {
                if let Some(v) = self.read_number_usize() {
                    scene.song_position = v;
                }
            }
            "loopMode" => {
                if let Some(v) = self.read_bool() {
                    scene.loop_mode = v;
                }
            }
            "loopStart" => {
                if let Some(v) = self.read_number_usize() {
                    scene.loop_start = v;
                }
            }
            "loopEnd" => {
                if let Some(v) = self.read_number_usize() {
                    scene.loop_end = v;
                }
            }
            "activeSongSlot" => {
                if let Some(v) = self.read_number_usize() {
                    scene.active_song_slot = v.min(1);
                }
            }
            "masterVolume" => {
                if let Some(v) = self.read_number_f32() {
                    scene.master_volume = v;
                }
            }
            "trackVolumes" => {
                if let Some(Value::Array(items)) = self.value_from_events() {
                    for (slot, v) in scene.track_volumes.iter_mut().zip(items) {
                        if let Some(f) = v.as_f64() {
                            *slot = f as f32;
                        }
                    }
                }
            }
            "tape" => {
                if let Some(v) = self.value_from_events() {
                    if let Ok(tape) = serde_json::from_value(v) {
                        scene.tape = tape;
                    }
                }
            }
            "vocal" => {
                if let Some(v) = self.value_from_events() {
                    if let Ok(vocal) = serde_json::from_value(v) {
                        scene.vocal = vocal;
                    }
                }
            }
            "feel" => {
                if let Some(v) = self.value_from_events() {
                    scene.feel = v;
                }
            }
            "genre" => {
                if let Some(v) = self.value_from_events() {
                    scene.genre = v;
                }
            }
            "led" => {
                if let Some(v) = self.value_from_events() {
                    scene.led = v;
                }
            }
            "drumFX" => {
                if let Some(v) = self.value_from_events() {
                    scene.drum_fx = v;
                }
            }
            "samplerPads" => {
                if let Some(v) = self.value_from_events() {
                    scene.sampler_pads = v;
                }
            }
            "customPhrases" => {
                if let Some(Value::Array(items)) = self.value_from_events() {
                    for (slot, v) in scene.custom_phrases.iter_mut().zip(items) {
                        if let Some(s) = v.as_str() {
                            *slot = s.to_string();
                        }
                    }
                }
            }
            _ => self.skip_value(),
        }
    }

    fn read_usize_pair(&mut self, out: &mut [usize; 2]) {
        if !self.expect_array_start() {
            return self.fail();
        }
        if !self.enter() {
            return;
        }
        let mut i = 0;
        loop {
            match self.next() {
                Some(JsonEvent::ArrayEnd) => break,
                Some(JsonEvent::Number(JsonNumber::Int(v))) => {
                    if let Some(slot) = out.get_mut(i) {
                        *slot = v.max(0) as usize;
                    }
                    i += 1;
                }
                Some(JsonEvent::Number(JsonNumber::Float(v))) => {
                    if let Some(slot) = out.get_mut(i) {
                        *slot = v.max(0.0) as usize;
                    }
                    i += 1;
                }
                _ => return self.fail(),
            }
        }
        self.leave();
    }

    fn read_bool_pair(&mut self, out: &mut [bool; 2]) {
        if !self.expect_array_start() {
            return self.fail();
        }
        if !self.enter() {
            return;
        }
        let mut i = 0;
        loop {
            match self.next() {
                Some(JsonEvent::ArrayEnd) => break,
                Some(JsonEvent::Bool(b)) => {
                    if let Some(slot) = out.get_mut(i) {
                        *slot = b;
                    }
                    i += 1;
                }
                _ => return self.fail(),
            }
        }
        self.leave();
    }

    fn load_mute(&mut self, scene: &mut Scene) {
        if !matches!(self.next(), Some(JsonEvent::ObjectStart)) {
            return self.fail();
        }
        if !self.enter() {
            return;
        }
        let mut mute = MuteState::default();
        loop {
            let key = match self.next() {
                Some(JsonEvent::ObjectEnd) => break,
                Some(JsonEvent::ObjectKey(k)) => k,
                _ => return self.fail(),
            };
            match key.as_str() {
                "drums" => self.read_bool_array(&mut mute.drums),
                "synth" => self.read_bool_pair(&mut mute.synth),
                _ => self.skip_value(),
            }
            if self.had_error {
                return;
            }
        }
        self.leave();
        scene.mute = mute;
    }

    fn load_synth_params(&mut self, scene: &mut Scene) {
        if !self.expect_array_start() {
            return self.fail();
        }
        if !self.enter() {
            return;
        }
        let mut idx = 0usize;
        loop {
            match self.next() {
                Some(JsonEvent::ArrayEnd) => break,
                Some(JsonEvent::ObjectStart) => {
                    if let Some(v) = self.value_from_event(JsonEvent::ObjectStart) {
                        if let Ok(snap) = serde_json::from_value::<SynthParamSnapshot>(v) {
                            if let Some(slot) = scene.synth_params.get_mut(idx) {
                                *slot = snap;
                            }
                        }
                    }
                    idx += 1;
                }
                _ => return self.fail(),
            }
            if self.had_error {
                return;
            }
        }
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_bpm_and_song_mode() {
        let json = r#"{"state": {"bpm": 140, "songMode": true}}"#;
        let scene = SceneObserver::load(json).expect("valid scene");
        assert_eq!(scene.bpm, 140.0);
        assert!(scene.song_mode);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let json = r#"{"somethingUnknown": {"a": [1,2,3]}, "state": {"bpm": 90}}"#;
        let scene = SceneObserver::load(json).expect("valid scene");
        assert_eq!(scene.bpm, 90.0);
    }

    #[test]
    fn malformed_json_yields_none() {
        assert!(SceneObserver::load("{not json}").is_none());
    }

    #[test]
    fn loads_drum_hit_at_step_zero() {
        let json = r#"{"drumBanks": [[ {"voices": [[true,false],[false],[false],[false],[false],[false],[false],[false],[false]]} ]]}"#;
        let scene = SceneObserver::load(json).expect("valid scene");
        assert!(scene.drum_banks[0].patterns[0].voices[0].steps[0].hit);
        assert!(!scene.drum_banks[0].patterns[0].voices[0].steps[1].hit);
    }
}
