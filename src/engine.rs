use rand::Rng;
use std::fmt;
use std::sync::OnceLock;

/// A direction to slide/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All directions in the tie-break priority order used by the advisor.
    pub const ALL: [Move; 4] = [Move::Up, Move::Left, Move::Down, Move::Right];

    /// Decode a direction from its wire index. Out-of-range values are rejected.
    #[inline]
    pub fn from_index(idx: u8) -> Option<Move> {
        match idx {
            0 => Some(Move::Up),
            1 => Some(Move::Down),
            2 => Some(Move::Left),
            3 => Some(Move::Right),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> u8 {
        match self {
            Move::Up => 0,
            Move::Down => 1,
            Move::Left => 2,
            Move::Right => 3,
        }
    }
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

type BoardRaw = u64;
type Line = u64;

/// Packed 4x4 2048 board as 16 4-bit exponent nibbles in a `u64`.
///
/// Nibble 0 (row 0, col 0) sits in the top four bits; indices run row-major.
/// A nibble holds the exponent of the tile, so 0 is empty and n is tile 2^n.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

struct Stores {
    collapse_left: Box<[u64]>,
    collapse_right: Box<[u64]>,
    collapse_up: Box<[u64]>,
    collapse_down: Box<[u64]>,
    merge_score: Box<[u64]>,
}

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self {
        Board(raw)
    }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw {
        self.0
    }

    /// Return the board resulting from sliding/merging tiles in `dir`.
    ///
    /// Pure: no random insert, no score bookkeeping. A move that changes
    /// nothing returns a board equal to `self`.
    #[inline]
    pub fn shift(self, dir: Move) -> Self {
        match dir {
            Move::Left | Move::Right => shift_rows(self, dir),
            Move::Up | Move::Down => shift_cols(self, dir),
        }
    }

    /// Score gained by the merges that `shift(dir)` would perform.
    ///
    /// Each merged pair contributes the merged tile's value, per the standard
    /// scoring rule. Zero when the shift merges nothing.
    #[inline]
    pub fn move_score(self, dir: Move) -> u64 {
        let table = &stores().merge_score;
        let src = match dir {
            Move::Left | Move::Right => self.0,
            Move::Up | Move::Down => transpose(self.0),
        };
        (0..4).fold(0, |acc, idx| {
            let line = extract_line(src, idx) as usize;
            acc + table[line]
        })
    }

    /// Insert a 2 (90%) or 4 (10%) tile into a uniformly random empty slot.
    ///
    /// Returns `self` unchanged when the board is full. Deterministic under a
    /// seeded RNG:
    /// ```
    /// use twenty48_core::engine::{self as GameEngine, Board};
    /// use rand::{rngs::StdRng, SeedableRng};
    /// GameEngine::new();
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let mut index = rng.gen_range(0..empty);
        let mut tmp = self.0;
        let mut tile = random_tile_exponent(rng);
        loop {
            while (tmp & 0xf) != 0 {
                tmp >>= 4;
                tile <<= 4;
            }
            if index == 0 {
                break;
            }
            index -= 1;
            tmp >>= 4;
            tile <<= 4;
        }
        Board(self.0 | tile)
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u64 {
        let mut x = self.0;
        x |= x >> 1;
        x |= x >> 2;
        x &= 0x1111_1111_1111_1111;
        16 - x.count_ones() as u64
    }

    /// True iff no direction changes the board.
    pub fn is_game_over(self) -> bool {
        Move::ALL.iter().all(|&dir| self.shift(dir) == self)
    }

    /// Exponent of the highest tile (0 on an empty board).
    #[inline]
    pub fn highest_rank(self) -> u8 {
        let mut max = 0;
        let mut tmp = self.0;
        while tmp != 0 {
            max = max.max((tmp & 0xf) as u8);
            tmp >>= 4;
        }
        max
    }

    /// Value of the highest tile (e.g. 2048), or 0 on an empty board.
    #[inline]
    pub fn highest_tile(self) -> u32 {
        match self.highest_rank() {
            0 => 0,
            r => 1 << r,
        }
    }

    /// Actual tile value at a row-major index in 0..16 (0 if empty).
    #[inline]
    pub fn tile_value(self, idx: usize) -> u32 {
        debug_assert!(idx < 16);
        match (self.0 >> (60 - 4 * idx)) & 0xf {
            0 => 0,
            r => 1 << r,
        }
    }

    /// All 16 tile values in row-major order (index = row * 4 + col).
    pub fn to_flat(self) -> [u32; 16] {
        let mut flat = [0u32; 16];
        for (idx, slot) in flat.iter_mut().enumerate() {
            *slot = self.tile_value(idx);
        }
        flat
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flat = self.to_flat();
        for row in flat.chunks(4) {
            writeln!(f, "{:>6} {:>6} {:>6} {:>6}", row[0], row[1], row[2], row[3])?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board {
    fn from(v: BoardRaw) -> Self {
        Board::from_raw(v)
    }
}
impl From<Board> for BoardRaw {
    fn from(b: Board) -> Self {
        b.raw()
    }
}

/// Initialize internal lookup tables on first use. Safe to call multiple times.
pub fn new() {
    STORES.get_or_init(create_stores);
}

static STORES: OnceLock<Stores> = OnceLock::new();

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn create_stores() -> Stores {
    // Heap-allocated: five 64K-entry tables would blow a stack frame.
    let mut collapse_left = vec![0u64; LINE_TABLE_SIZE];
    let mut collapse_right = vec![0u64; LINE_TABLE_SIZE];
    let mut collapse_up = vec![0u64; LINE_TABLE_SIZE];
    let mut collapse_down = vec![0u64; LINE_TABLE_SIZE];
    let mut merge_score = vec![0u64; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let tiles = unpack_line(val as Line);
        let (fwd, score) = collapse_line(tiles);
        let (rev, _) = collapse_line(reverse_line(tiles));
        let bwd = reverse_line(rev);
        collapse_left[val] = pack_row(fwd);
        collapse_right[val] = pack_row(bwd);
        collapse_up[val] = pack_col(fwd);
        collapse_down[val] = pack_col(bwd);
        merge_score[val] = score;
    }

    Stores {
        collapse_left: collapse_left.into_boxed_slice(),
        collapse_right: collapse_right.into_boxed_slice(),
        collapse_up: collapse_up.into_boxed_slice(),
        collapse_down: collapse_down.into_boxed_slice(),
        merge_score: merge_score.into_boxed_slice(),
    }
}

/// Slide the four exponents toward index 0, merging equal neighbours once.
///
/// A cell produced by a merge never merges again within the same call.
/// Returns the collapsed line and the score gained (sum of merged values).
fn collapse_line(tiles: [u8; 4]) -> ([u8; 4], u64) {
    let mut out = [0u8; 4];
    let mut score = 0u64;
    let mut write = 0;
    let mut pending = 0u8;
    for &t in tiles.iter() {
        if t == 0 {
            continue;
        }
        if pending == 0 {
            pending = t;
        } else if pending == t {
            out[write] = pending + 1;
            score += 1 << (pending + 1);
            write += 1;
            pending = 0;
        } else {
            out[write] = pending;
            write += 1;
            pending = t;
        }
    }
    if pending != 0 {
        out[write] = pending;
    }
    (out, score)
}

#[inline]
fn unpack_line(line: Line) -> [u8; 4] {
    [
        ((line >> 12) & 0xf) as u8,
        ((line >> 8) & 0xf) as u8,
        ((line >> 4) & 0xf) as u8,
        (line & 0xf) as u8,
    ]
}

#[inline]
fn reverse_line(tiles: [u8; 4]) -> [u8; 4] {
    [tiles[3], tiles[2], tiles[1], tiles[0]]
}

#[inline]
fn pack_row(tiles: [u8; 4]) -> Line {
    (tiles[0] as u64) << 12 | (tiles[1] as u64) << 8 | (tiles[2] as u64) << 4 | tiles[3] as u64
}

// Column layout: nibbles spaced 16 bits apart so the per-column results can be
// OR'd straight into the board after an offset shift.
#[inline]
fn pack_col(tiles: [u8; 4]) -> Line {
    (tiles[0] as u64) << 48 | (tiles[1] as u64) << 32 | (tiles[2] as u64) << 16 | tiles[3] as u64
}

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F0_0F0F_F0F0_0F0F;
    let a2 = x & 0x0000_F0F0_0000_F0F0;
    let a3 = x & 0x0F0F_0000_0F0F_0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00_FF00_00FF_00FF;
    let b2 = a & 0x00FF_00FF_0000_0000;
    let b3 = a & 0x0000_0000_FF00_FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

pub(crate) fn extract_line(board: BoardRaw, line_idx: u64) -> Line {
    (board >> ((3 - line_idx) * 16)) & 0xffff
}

fn shift_rows(board: Board, dir: Move) -> Board {
    let s = stores();
    let table: &[u64] = match dir {
        Move::Left => &s.collapse_left,
        Move::Right => &s.collapse_right,
        _ => unreachable!("shift_rows only handles horizontal moves"),
    };
    let res = (0..4).fold(0, |acc, row_idx| {
        let row = extract_line(board.0, row_idx) as usize;
        acc | (table[row] << (48 - 16 * row_idx))
    });
    Board(res)
}

fn shift_cols(board: Board, dir: Move) -> Board {
    let transposed = transpose(board.0);
    let s = stores();
    let table: &[u64] = match dir {
        Move::Up => &s.collapse_up,
        Move::Down => &s.collapse_down,
        _ => unreachable!("shift_cols only handles vertical moves"),
    };
    let res = (0..4).fold(0, |acc, col_idx| {
        let col = extract_line(transposed, col_idx) as usize;
        acc | (table[col] << (12 - 4 * col_idx))
    });
    Board(res)
}

// Exponent 1 (tile 2) with probability 0.9, exponent 2 (tile 4) otherwise.
fn random_tile_exponent<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    if rng.gen_range(0..10) < 9 {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn collapse_slides_and_merges_once() {
        assert_eq!(collapse_line([0, 0, 0, 0]), ([0, 0, 0, 0], 0));
        assert_eq!(collapse_line([1, 2, 1, 2]), ([1, 2, 1, 2], 0));
        // Pairs merge once each: [2,2,4,4] -> [4,8], scoring 4 + 8.
        assert_eq!(collapse_line([1, 1, 2, 2]), ([2, 3, 0, 0], 12));
        // A merged cell cannot merge again: [2,2,4] -> [4,4], not [8].
        assert_eq!(collapse_line([1, 1, 2, 0]), ([2, 2, 0, 0], 4));
        assert_eq!(collapse_line([1, 0, 0, 1]), ([2, 0, 0, 0], 4));
        assert_eq!(collapse_line([0, 2, 2, 2]), ([3, 2, 0, 0], 8));
    }

    #[test]
    fn shift_left() {
        new();
        assert_eq!(Board::from_raw(0x0000).shift(Move::Left), Board::from_raw(0x0000));
        assert_eq!(Board::from_raw(0x0002).shift(Move::Left), Board::from_raw(0x2000));
        assert_eq!(Board::from_raw(0x2020).shift(Move::Left), Board::from_raw(0x3000));
        assert_eq!(Board::from_raw(0x1332).shift(Move::Left), Board::from_raw(0x1420));
        assert_eq!(Board::from_raw(0x1234).shift(Move::Left), Board::from_raw(0x1234));
        assert_eq!(Board::from_raw(0x1002).shift(Move::Left), Board::from_raw(0x1200));
    }

    #[test]
    fn shift_right() {
        new();
        assert_eq!(Board::from_raw(0x2000).shift(Move::Right), Board::from_raw(0x0002));
        assert_eq!(Board::from_raw(0x2020).shift(Move::Right), Board::from_raw(0x0003));
        assert_eq!(Board::from_raw(0x1332).shift(Move::Right), Board::from_raw(0x0142));
        assert_eq!(Board::from_raw(0x1234).shift(Move::Right), Board::from_raw(0x1234));
        assert_eq!(Board::from_raw(0x1002).shift(Move::Right), Board::from_raw(0x0012));
    }

    #[test]
    fn shift_vertical() {
        new();
        let board = Board::from_raw(0x1121_2300_3300_4222);
        assert_eq!(board.shift(Move::Up), Board::from_raw(0x1131_2402_3200_4000));
        assert_eq!(board.shift(Move::Down), Board::from_raw(0x1000_2100_3401_4232));
    }

    #[test]
    fn move_score_counts_merged_values() {
        new();
        // Row [2,2,0,0]: merging the pair scores 4.
        let board = Board::from_raw(0x1100_0000_0000_0000);
        assert_eq!(board.move_score(Move::Left), 4);
        assert_eq!(board.shift(Move::Left), Board::from_raw(0x2000_0000_0000_0000));
        // Column merge scores the same through a vertical move.
        let board = Board::from_raw(0x1000_1000_0000_0000);
        assert_eq!(board.move_score(Move::Up), 4);
        // No merge, no score, even when tiles slide.
        let board = Board::from_raw(0x0100_0000_0000_0000);
        assert_eq!(board.move_score(Move::Left), 0);
        // Two pairs in one row: [4,4,8,8] -> 8 + 16.
        let board = Board::from_raw(0x2233_0000_0000_0000);
        assert_eq!(board.move_score(Move::Left), 24);
        assert_eq!(board.move_score(Move::Right), 24);
    }

    #[test]
    fn random_tile_fills_empty_cells_only() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut board = Board::EMPTY;
        for expected_empty in (0..16).rev() {
            let before = board;
            board = board.with_random_tile(&mut rng);
            assert_eq!(board.count_empty(), expected_empty);
            // Existing tiles are untouched: the new raw strictly extends the old.
            assert_eq!(board.raw() & before.raw(), before.raw());
        }
        // Full board: spawning is a no-op.
        assert_eq!(board.with_random_tile(&mut rng), board);
    }

    #[test]
    fn shift_preserves_total_tile_sum() {
        new();
        let sum = |b: Board| b.to_flat().iter().map(|&v| v as u64).sum::<u64>();
        let mut rng = StdRng::seed_from_u64(100);
        let mut board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        for i in 0..200 {
            let dir = Move::ALL[i % 4];
            let shifted = board.shift(dir);
            // Merges move value around but never create or destroy it.
            assert_eq!(sum(shifted), sum(board));
            if shifted != board {
                board = shifted.with_random_tile(&mut rng);
            } else if board.is_game_over() {
                break;
            }
        }
    }

    #[test]
    fn checkerboard_is_terminal() {
        new();
        let board = Board::from_raw(0x1212_2121_1212_2121);
        for dir in Move::ALL {
            assert_eq!(board.shift(dir), board);
        }
        assert!(board.is_game_over());
    }

    #[test]
    fn saturated_board_without_adjacent_pairs_is_terminal() {
        new();
        // Full board, no two orthogonal neighbours equal.
        let board = Board::from_raw(0x1234_5678_1234_5678);
        assert_eq!(board.count_empty(), 0);
        assert!(board.is_game_over());
    }

    #[test]
    fn board_with_room_is_not_terminal() {
        new();
        assert!(!Board::from_raw(0x1100_0000_0000_0000).is_game_over());
        // Full but mergeable.
        assert!(!Board::from_raw(0x1134_5678_1234_5678).is_game_over());
    }

    #[test]
    fn count_empty_matches_population() {
        assert_eq!(Board::from_raw(0x1111_0000_1111_0000).count_empty(), 8);
        assert_eq!(Board::from_raw(0x1100_0000_0000_0000).count_empty(), 14);
        assert_eq!(Board::EMPTY.count_empty(), 16);
    }

    #[test]
    fn tile_values_are_powers_of_two() {
        let board = Board::from_raw(0x0123_4567_89ab_cdef);
        assert_eq!(board.tile_value(0), 0);
        assert_eq!(board.tile_value(3), 8);
        assert_eq!(board.tile_value(10), 1024);
        assert_eq!(board.tile_value(15), 32768);
        assert_eq!(board.highest_tile(), 32768);
    }

    #[test]
    fn flat_layout_is_row_major() {
        let board = Board::from_raw(0x1200_0030_0000_0004);
        let flat = board.to_flat();
        assert_eq!(flat[0], 2);
        assert_eq!(flat[1], 4);
        assert_eq!(flat[6], 8);
        assert_eq!(flat[15], 16);
        assert_eq!(flat.iter().filter(|&&v| v != 0).count(), 4);
    }

    #[test]
    fn move_indices_round_trip_and_reject_garbage() {
        for dir in Move::ALL {
            assert_eq!(Move::from_index(dir.index()), Some(dir));
        }
        assert_eq!(Move::from_index(4), None);
        assert_eq!(Move::from_index(255), None);
    }
}
