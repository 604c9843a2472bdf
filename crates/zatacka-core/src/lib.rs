pub mod error;
pub mod input;
pub mod player;
pub mod powerup;
pub mod registry;
pub mod render;
pub mod settings;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::VecDeque;

    use crate::input::{InputSource, KeyBindingRegistry};
    use crate::player::{PlayerColor, PlayerId, PowerKind};
    use crate::registry::PlayerRegistry;
    use crate::render::{GridPos, Renderer};
    use crate::settings::MatchSettings;

    /// `[left, power, right]` keys for up to 8 players, no symbol shared.
    pub const KEY_SETS: [[char; 3]; 8] = [
        ['a', 's', 'd'],
        ['j', 'k', 'l'],
        ['z', 'x', 'c'],
        ['u', 'i', 'o'],
        ['v', 'b', 'n'],
        ['q', 'w', 'e'],
        ['r', 't', 'y'],
        ['f', 'g', 'h'],
    ];

    /// Settings for `n` players and `rounds` rounds.
    pub fn make_settings(n: u8, rounds: u32) -> MatchSettings {
        let mut settings = MatchSettings::new();
        settings
            .set_num_players(n)
            .expect("test player count must be valid");
        settings
            .set_num_rounds(rounds)
            .expect("test round count must be valid");
        settings
    }

    /// Registry of `n` players named `Player1..` with palette colors and no powers.
    pub fn make_registry(n: usize) -> PlayerRegistry {
        make_registry_with_power(n, PowerKind::None)
    }

    /// Registry of `n` players who all hold `power`.
    pub fn make_registry_with_power(n: usize, power: PowerKind) -> PlayerRegistry {
        let mut registry = PlayerRegistry::new(n as u8);
        for i in 0..n {
            registry
                .register(format!("Player{}", i + 1), PlayerColor::PALETTE[i], power)
                .expect("test registration must succeed");
        }
        registry
    }

    /// Complete bindings for players `0..n` using [`KEY_SETS`].
    pub fn make_bindings(n: usize) -> KeyBindingRegistry {
        let mut keys = KeyBindingRegistry::new();
        for (i, set) in KEY_SETS.iter().enumerate().take(n) {
            keys.bind_player(i as PlayerId, *set)
                .expect("test key sets never overlap");
        }
        keys
    }

    /// One recorded renderer call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum DrawCall {
        Mark(GridPos, u32),
        Clear(GridPos),
    }

    /// Renderer that records every call in order.
    #[derive(Debug, Default)]
    pub struct RecordingRenderer {
        pub calls: Vec<DrawCall>,
    }

    impl RecordingRenderer {
        pub fn marks(&self) -> impl Iterator<Item = (GridPos, u32)> + '_ {
            self.calls.iter().filter_map(|c| match *c {
                DrawCall::Mark(pos, color) => Some((pos, color)),
                DrawCall::Clear(_) => None,
            })
        }

        pub fn clears(&self) -> impl Iterator<Item = GridPos> + '_ {
            self.calls.iter().filter_map(|c| match *c {
                DrawCall::Clear(pos) => Some(pos),
                DrawCall::Mark(..) => None,
            })
        }
    }

    impl Renderer for RecordingRenderer {
        fn mark(&mut self, pos: GridPos, color: u32) {
            self.calls.push(DrawCall::Mark(pos, color));
        }

        fn clear(&mut self, pos: GridPos) {
            self.calls.push(DrawCall::Clear(pos));
        }
    }

    /// Input source replaying a fixed script: one batch of symbols per poll.
    #[derive(Debug, Default)]
    pub struct ScriptedInput {
        batches: VecDeque<Vec<char>>,
        stop_when_exhausted: bool,
    }

    impl ScriptedInput {
        pub fn new(batches: impl IntoIterator<Item = Vec<char>>) -> Self {
            Self {
                batches: batches.into_iter().collect(),
                stop_when_exhausted: false,
            }
        }

        /// Request a stop once every batch has been consumed.
        pub fn then_stop(mut self) -> Self {
            self.stop_when_exhausted = true;
            self
        }
    }

    impl InputSource for ScriptedInput {
        fn poll(&mut self) -> Vec<char> {
            self.batches.pop_front().unwrap_or_default()
        }

        fn stop_requested(&mut self) -> bool {
            self.stop_when_exhausted && self.batches.is_empty()
        }
    }
}
