//! Game constants

use std::time::Duration;

/// Well height in rows
pub const ROWS: usize = 20;

/// Well width in columns
pub const COLS: usize = 10;

/// Fall interval per level, in milliseconds
pub const SPEEDS: [u64; 8] = [1000, 800, 600, 500, 400, 300, 200, 100];

/// Highest reachable level
pub const MAX_LEVEL: u32 = (SPEEDS.len() - 1) as u32;

/// Base reward for clearing 1, 2, 3 or 4 lines at once, multiplied by `level + 1`
pub const LINE_REWARDS: [u32; 4] = [40, 100, 300, 1200];

/// Cleared lines needed per level
pub const LINES_PER_LEVEL: u32 = 10;

/// Size of the square preview box
pub const PREVIEW_SIZE: usize = 4;

/// Cadence of the snapshot push attempts
pub const SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// Level reached after clearing `lines` lines in total
pub fn level_for_lines(lines: u32) -> u32 {
    (lines / LINES_PER_LEVEL).min(MAX_LEVEL)
}

/// Fall interval at `level`; levels past the table use the fastest speed
pub fn fall_interval(level: u32) -> Duration {
    let index = (level as usize).min(SPEEDS.len() - 1);
    Duration::from_millis(SPEEDS[index])
}

/// Score for clearing `lines` lines in one lock at `level`
pub fn line_reward(lines: u32, level: u32) -> u32 {
    match lines {
        0 => 0,
        n => LINE_REWARDS[(n as usize).min(LINE_REWARDS.len()) - 1] * (level + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_is_capped_and_monotone() {
        let mut previous = 0;
        for lines in 0..300 {
            let level = level_for_lines(lines);
            assert_eq!(level, (lines / 10).min(7));
            assert!(level >= previous);
            previous = level;
        }
        assert_eq!(level_for_lines(9), 0);
        assert_eq!(level_for_lines(10), 1);
        assert_eq!(level_for_lines(1000), MAX_LEVEL);
    }

    #[test]
    fn test_rewards() {
        assert_eq!(line_reward(1, 0), 40);
        assert_eq!(line_reward(4, 0), 1200);
        assert_eq!(line_reward(2, 2), 300);
        assert_eq!(line_reward(0, 5), 0);
    }

    #[test]
    fn test_fall_interval() {
        assert_eq!(fall_interval(0), Duration::from_millis(1000));
        assert_eq!(fall_interval(7), Duration::from_millis(100));
        assert_eq!(fall_interval(42), Duration::from_millis(100));
    }
}
