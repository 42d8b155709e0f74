//! Shuffle algorithms for queue randomization
//!
//! Implements per-song (Fisher-Yates) and per-album shuffles. Both produce a
//! permutation of indices so the queue can cache a precomputed order.

use crate::types::ShuffleMode;
use encore_core::{AlbumId, Track};
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::HashMap;

/// Compute a shuffled order of `tracks` without touching them
///
/// The result is a permutation of `0..tracks.len()`.
pub fn permutation(tracks: &[Track], mode: ShuffleMode) -> Vec<usize> {
    match mode {
        ShuffleMode::None => (0..tracks.len()).collect(),
        ShuffleMode::Songs => song_permutation(tracks.len()),
        ShuffleMode::Albums => album_permutation(tracks),
    }
}

/// Pure random shuffle using Fisher-Yates
fn song_permutation(len: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(&mut thread_rng());
    order
}

/// Album shuffle
///
/// Groups tracks by album, shuffles the order of the groups and keeps each
/// album's tracks in their original insertion order. Tracks without an album
/// id form a group of their own.
fn album_permutation(tracks: &[Track]) -> Vec<usize> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_album: HashMap<AlbumId, usize> = HashMap::new();

    for (index, track) in tracks.iter().enumerate() {
        match track.album_id {
            Some(album_id) => {
                let group = *by_album.entry(album_id).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[group].push(index);
            }
            None => groups.push(vec![index]),
        }
    }

    for group in &mut groups {
        group.sort_by_key(|&i| tracks[i].flags.order);
    }
    groups.shuffle(&mut thread_rng());

    groups.into_iter().flatten().collect()
}
