//! # RandomSource（乱数ソース）
//!
//! 抽選番号の割り当てに使う一様乱数の抽象化。
//!
//! 暗号論的な強度は要求しない。要求されるのは「呼び出し側が受け取る番号を
//! 予測・誘導できない程度に偏りがないこと」だけである。
//! テストでは [`SeededRandomSource`] や `ScriptedRandomSource` を注入し、
//! 割り当て結果を再現可能にする。

use std::sync::Mutex;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// 一様乱数でインデックスを引くトレイト
pub trait RandomSource: Send + Sync {
    /// `[0, upper)` の範囲から一様にインデックスを 1 つ引く
    ///
    /// 呼び出し側は `upper >= 1` を保証する。
    fn next_index(&self, upper: usize) -> usize;
}

/// スレッドローカル乱数生成器を使う本番用実装
pub struct ThreadRandomSource;

impl RandomSource for ThreadRandomSource {
    fn next_index(&self, upper: usize) -> usize {
        rand::rng().random_range(0..upper)
    }
}

/// シード固定の乱数生成器
///
/// 同じシードからは同じ系列が得られる。
pub struct SeededRandomSource {
    rng: Mutex<StdRng>,
}

impl SeededRandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn next_index(&self, upper: usize) -> usize {
        // ロック中に panic するコードパスはないため、poison は起こり得ない
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        rng.random_range(0..upper)
    }
}

/// あらかじめ決めたインデックス列を順に返すテスト用実装
///
/// 範囲外の値は `upper` で剰余を取る。列を使い切った後は常に 0 を返す。
#[cfg(any(test, feature = "test-support"))]
pub struct ScriptedRandomSource {
    indices: Mutex<std::collections::VecDeque<usize>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedRandomSource {
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            indices: Mutex::new(indices.into_iter().collect()),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RandomSource for ScriptedRandomSource {
    fn next_index(&self, upper: usize) -> usize {
        let mut indices = self
            .indices
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        indices.pop_front().map_or(0, |i| i % upper)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(10)]
    #[case(1000)]
    fn test_thread_random_sourceは範囲内のインデックスを返す(#[case] upper: usize) {
        let sut = ThreadRandomSource;

        for _ in 0..200 {
            assert!(sut.next_index(upper) < upper);
        }
    }

    #[test]
    fn test_同じシードからは同じ系列が得られる() {
        let a = SeededRandomSource::new(42);
        let b = SeededRandomSource::new(42);

        let seq_a: Vec<usize> = (0..20).map(|_| a.next_index(100)).collect();
        let seq_b: Vec<usize> = (0..20).map(|_| b.next_index(100)).collect();

        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_scripted_random_sourceは指定順に返し剰余で範囲に収める() {
        let sut = ScriptedRandomSource::new([3, 12, 1]);

        assert_eq!(sut.next_index(10), 3);
        assert_eq!(sut.next_index(10), 2);
        assert_eq!(sut.next_index(10), 1);
        // 使い切った後は 0
        assert_eq!(sut.next_index(10), 0);
    }
}
