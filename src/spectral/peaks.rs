use std::collections::VecDeque;

use crate::spectral::spectrogram::Spectrogram;

/// A local maximum of the time-frequency plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peak {
    pub freq: usize,
    pub time: usize,
}

/// Bins whose value equals the maximum of the surrounding square of side
/// `win_size` and clears `min_amp`, returned in (time, frequency) order.
///
/// The square spans `win_size / 2` steps back and the remainder forward in
/// both dimensions, clamped at the edges. Plateau bins tie with their own
/// dilation, so all of them qualify.
pub fn local_peaks(spec: &Spectrogram, win_size: usize, min_amp: f32) -> Vec<Peak> {
    let frames = spec.frames();
    let bins = spec.bins();
    if frames == 0 || win_size == 0 {
        return Vec::new();
    }
    let back = win_size / 2;
    let ahead = win_size - 1 - back;

    // A square dilation is separable: one pass along frequency, then one
    // along time over the first pass's output.
    let freq_max: Vec<Vec<f32>> = (0..frames)
        .map(|t| sliding_max(spec.frame(t), back, ahead))
        .collect();

    let mut peaks = Vec::new();
    let mut column = vec![0.0_f32; frames];
    for f in 0..bins {
        for (t, slot) in column.iter_mut().enumerate() {
            *slot = freq_max[t][f];
        }
        let dilated = sliding_max(&column, back, ahead);

        for t in 0..frames {
            let value = spec.value(f, t);
            if value == dilated[t] && value > min_amp {
                peaks.push(Peak { freq: f, time: t });
            }
        }
    }

    peaks.sort_unstable_by_key(|p| (p.time, p.freq));
    peaks
}

/// Maximum over the clamped window `[i - back, i + ahead]` for every index,
/// using a monotonically decreasing deque of candidate indices.
fn sliding_max(values: &[f32], back: usize, ahead: usize) -> Vec<f32> {
    let n = values.len();
    let mut out = Vec::with_capacity(n);
    let mut window: VecDeque<usize> = VecDeque::new();
    let mut next = 0;

    for i in 0..n {
        let hi = (i + ahead).min(n - 1);
        while next <= hi {
            while window.back().is_some_and(|&b| values[b] <= values[next]) {
                window.pop_back();
            }
            window.push_back(next);
            next += 1;
        }
        let lo = i.saturating_sub(back);
        while window.front().is_some_and(|&f| f < lo) {
            window.pop_front();
        }
        // The window always holds an index in [lo, hi].
        out.push(values[window[0]]);
    }
    out
}
