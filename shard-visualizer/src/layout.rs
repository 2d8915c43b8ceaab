use crate::*;

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, TAU};

#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub width: f64,
    pub height: f64,
    /// Radius of the circle the shards are placed on.
    pub ring_radius: f64,
    pub shard_radius: f64,
    /// Distance of account dots from the shard center, relative to `shard_radius`.
    pub account_orbit_ratio: f64,
    pub min_account_radius: f64,
    pub max_account_radius: f64,
    pub particle_radius: f64,
    pub base_hue: u32,
    pub hue_range: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            ring_radius: 300.0,
            shard_radius: 80.0,
            account_orbit_ratio: 0.6,
            min_account_radius: 5.0,
            max_account_radius: 20.0,
            particle_radius: 3.0,
            base_hue: 240,
            hue_range: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShardAnchor {
    pub shard_id: ShardId,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountPosition {
    pub account_id: String,
    pub x: f64,
    pub y: f64,
    pub shard_id: ShardId,
    pub angle: f64,
}

impl AccountPosition {
    pub fn point(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountDot {
    pub position: AccountPosition,
    pub radius: f64,
    pub color: String,
    pub receipt_count: u64,
    pub transaction_count: u64,
}

#[derive(Debug, Clone)]
pub struct FrameLayout {
    pub anchors: Vec<ShardAnchor>,
    pub accounts: Vec<AccountDot>,
    pub positions: HashMap<String, AccountPosition>,
}

pub fn center(config: &LayoutConfig) -> Point {
    Point {
        x: config.width / 2.0,
        y: config.height / 2.0,
    }
}

/// Shard centers, evenly spaced clockwise starting from the top.
pub fn shard_anchors(config: &LayoutConfig) -> Vec<ShardAnchor> {
    let center = center(config);
    (0..SHARD_COUNT)
        .map(|shard_id| {
            let angle = shard_id as f64 * TAU / SHARD_COUNT as f64 - FRAC_PI_2;
            ShardAnchor {
                shard_id,
                x: center.x + angle.cos() * config.ring_radius,
                y: center.y + angle.sin() * config.ring_radius,
                angle,
            }
        })
        .collect()
}

fn account_digest(account_id: &str) -> [u8; 32] {
    Sha256::digest(account_id.as_bytes()).into()
}

/// Angle in `[0, 2π)` that only depends on the account id.
pub fn account_angle(account_id: &str) -> f64 {
    let digest = account_digest(account_id);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    // Top 53 bits fit an f64 mantissa exactly, keeping the result below 1.0
    let unit = (u64::from_be_bytes(bytes) >> 11) as f64 / (1u64 << 53) as f64;
    unit * TAU
}

pub fn account_color(config: &LayoutConfig, account_id: &str) -> String {
    let digest = account_digest(account_id);
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&digest[8..12]);
    let hue = config.base_hue + u32::from_be_bytes(bytes) % config.hue_range.max(1);
    format!("hsl({hue}, 80%, 60%)")
}

/// Linear scale of `receipt_count` over `[0, max(1, max_receipt_count)]`
/// onto the dot radius range, clamped to that range.
pub fn account_radius(config: &LayoutConfig, receipt_count: u64, max_receipt_count: u64) -> f64 {
    let domain = max_receipt_count.max(1) as f64;
    let radius = config.min_account_radius
        + (config.max_account_radius - config.min_account_radius) * receipt_count as f64 / domain;
    radius.clamp(config.min_account_radius, config.max_account_radius)
}

pub fn account_position(
    anchor: &ShardAnchor,
    config: &LayoutConfig,
    account_id: &str,
) -> AccountPosition {
    let angle = account_angle(account_id);
    let orbit = config.shard_radius * config.account_orbit_ratio;
    AccountPosition {
        account_id: account_id.to_string(),
        x: anchor.x + angle.cos() * orbit,
        y: anchor.y + angle.sin() * orbit,
        shard_id: anchor.shard_id,
        angle,
    }
}

pub fn layout_frame(config: &LayoutConfig, summary: &BlockSummary) -> FrameLayout {
    let anchors = shard_anchors(config);
    let mut accounts = vec![];
    let mut positions = HashMap::new();
    for (anchor, shard) in anchors.iter().zip(summary.shards.iter()) {
        let max_receipt_count = shard.max_receipt_count();
        for activity in shard.accounts.values() {
            let position = account_position(anchor, config, &activity.account_id);
            positions.insert(activity.account_id.clone(), position.clone());
            accounts.push(AccountDot {
                position,
                radius: account_radius(config, activity.receipt_count, max_receipt_count),
                color: account_color(config, &activity.account_id),
                receipt_count: activity.receipt_count,
                transaction_count: activity.transaction_count,
            });
        }
    }
    FrameLayout {
        anchors,
        accounts,
        positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_summary::AccountActivity;

    const EPSILON: f64 = 1e-9;

    fn summary_with(accounts: &[(ShardId, &str, u64)]) -> BlockSummary {
        let mut summary = BlockSummary::default();
        for (shard_id, account_id, receipt_count) in accounts {
            summary.shards[*shard_id].accounts.insert(
                account_id.to_string(),
                AccountActivity {
                    account_id: account_id.to_string(),
                    receipt_count: *receipt_count,
                    transaction_count: 0,
                },
            );
        }
        summary
    }

    #[test]
    fn test_shard_anchors_start_at_top_and_go_clockwise() {
        let config = LayoutConfig::default();
        let anchors = shard_anchors(&config);
        assert_eq!(anchors.len(), SHARD_COUNT);

        assert!((anchors[0].x - 600.0).abs() < EPSILON);
        assert!((anchors[0].y - 100.0).abs() < EPSILON);
        // Screen y grows downwards, so clockwise moves to the right first
        assert!(anchors[1].x > anchors[0].x);
        assert!(anchors[1].y > anchors[0].y);
        assert!((anchors[3].x - 600.0).abs() < EPSILON);
        assert!((anchors[3].y - 700.0).abs() < EPSILON);

        for anchor in &anchors {
            let distance = (anchor.x - 600.0).hypot(anchor.y - 400.0);
            assert!((distance - config.ring_radius).abs() < EPSILON);
        }
    }

    #[test]
    fn test_account_angle_is_deterministic_and_in_range() {
        for account_id in ["alice.near", "bob.near", "wrap.near", ""] {
            let angle = account_angle(account_id);
            assert_eq!(angle, account_angle(account_id));
            assert!((0.0..TAU).contains(&angle));
        }
        assert_ne!(account_angle("alice.near"), account_angle("bob.near"));
    }

    #[test]
    fn test_account_color_stays_in_hue_range() {
        let config = LayoutConfig::default();
        for account_id in ["alice.near", "bob.near", "aurora", "x.tg"] {
            let color = account_color(&config, account_id);
            assert_eq!(color, account_color(&config, account_id));
            let hue: u32 = color
                .trim_start_matches("hsl(")
                .split(',')
                .next()
                .unwrap()
                .parse()
                .unwrap();
            assert!((240..300).contains(&hue));
        }
    }

    #[test]
    fn test_account_radius_scale() {
        let config = LayoutConfig::default();
        assert_eq!(account_radius(&config, 0, 0), 5.0);
        assert_eq!(account_radius(&config, 0, 10), 5.0);
        assert_eq!(account_radius(&config, 5, 10), 12.5);
        assert_eq!(account_radius(&config, 10, 10), 20.0);
        assert_eq!(account_radius(&config, 1, 0), 20.0);
        // A count above the observed maximum still stays inside the shard
        assert_eq!(account_radius(&config, 50, 10), 20.0);
        assert!(
            config.shard_radius * config.account_orbit_ratio + config.max_account_radius
                < config.shard_radius
        );
    }

    #[test]
    fn test_layout_places_accounts_inside_their_shard() {
        let config = LayoutConfig::default();
        let summary = summary_with(&[
            (2, "alice.near", 1),
            (2, "bob.near", 4),
            (5, "wrap.near", 0),
        ]);
        let layout = layout_frame(&config, &summary);

        assert_eq!(layout.accounts.len(), 3);
        assert_eq!(layout.positions.len(), 3);
        for dot in &layout.accounts {
            let anchor = &layout.anchors[dot.position.shard_id];
            let distance = (dot.position.x - anchor.x).hypot(dot.position.y - anchor.y);
            assert!((distance - 48.0).abs() < EPSILON);
            assert_eq!(dot.position.angle, account_angle(&dot.position.account_id));
        }
        let bob = layout.accounts.iter().find(|dot| dot.position.account_id == "bob.near").unwrap();
        assert_eq!(bob.radius, 20.0);
        let wrap = &layout.positions["wrap.near"];
        assert_eq!(wrap.shard_id, 5);
    }

    #[test]
    fn test_position_does_not_depend_on_other_accounts() {
        let config = LayoutConfig::default();
        let alone = layout_frame(&config, &summary_with(&[(3, "intear.near", 1)]));
        let crowded = layout_frame(
            &config,
            &summary_with(&[(3, "hot.tg", 9), (3, "intear.near", 1), (3, "harvest.tg", 3)]),
        );
        assert_eq!(alone.positions["intear.near"], crowded.positions["intear.near"]);
    }
}
