use market_core::Bar;

/// Return val if it is finite, otherwise return default.
#[inline]
pub fn finite_or(val: f64, default: f64) -> f64 {
    if val.is_finite() {
        val
    } else {
        default
    }
}

fn nan_series(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

/// True Range per bar; tr[0] is plain high-low since there is no prior close.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    if bars.is_empty() {
        return vec![];
    }

    let mut tr = Vec::with_capacity(bars.len());
    tr.push(bars[0].high - bars[0].low);

    for i in 1..bars.len() {
        let high_low = bars[i].high - bars[i].low;
        let high_close = (bars[i].high - bars[i - 1].close).abs();
        let low_close = (bars[i].low - bars[i - 1].close).abs();
        tr.push(high_low.max(high_close).max(low_close));
    }

    tr
}

/// Simple Moving Average. Output is input-length; the first period-1 slots are
/// NaN so downstream indicators stay index-aligned with the frame.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    let n = data.len();
    let mut result = nan_series(n);
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        // NaN inputs inside the window propagate into the output slot.
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result[i] = sum / period as f64;
    }
    result
}

/// Exponential Moving Average, SMA-seeded. Leading NaNs in the input (e.g. a
/// MACD line) shift the seed window right; warmup slots stay NaN.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    let n = data.len();
    let mut result = nan_series(n);
    if period == 0 {
        return result;
    }

    let start = match data.iter().position(|v| !v.is_nan()) {
        Some(idx) => idx,
        None => return result,
    };
    if n - start < period {
        return result;
    }

    // Seed: SMA over the first `period` valid elements
    let seed_idx = start + period - 1;
    let seed: f64 = data[start..=seed_idx].iter().sum::<f64>() / period as f64;
    result[seed_idx] = seed;

    let multiplier = 2.0 / (period as f64 + 1.0);
    for i in (seed_idx + 1)..n {
        let prev = result[i - 1];
        result[i] = (data[i] - prev) * multiplier + prev;
    }

    result
}

/// Relative Strength Index (Wilder smoothing), in [0, 100].
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    let n = data.len();
    let mut result = nan_series(n);
    if period == 0 || n < period + 1 {
        return result;
    }

    let mut gains = Vec::with_capacity(n - 1);
    let mut losses = Vec::with_capacity(n - 1);
    for i in 1..n {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    result[period] = rsi_from_averages(avg_gain, avg_loss);

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        // gains[i] describes the move into bar i+1
        result[i + 1] = rsi_from_averages(avg_gain, avg_loss);
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    finite_or(100.0 - (100.0 / (1.0 + rs)), 50.0)
}

/// Stochastic Oscillator
pub struct StochasticResult {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(
    bars: &[Bar],
    k_period: usize,
    d_period: usize,
    smooth_k: usize,
) -> StochasticResult {
    let n = bars.len();
    let mut raw_k = nan_series(n);
    if k_period == 0 || n < k_period {
        return StochasticResult {
            k: raw_k.clone(),
            d: raw_k,
        };
    }

    for i in (k_period - 1)..n {
        let slice = &bars[i + 1 - k_period..=i];
        let highest = slice
            .iter()
            .map(|b| b.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let lowest = slice.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

        raw_k[i] = if highest == lowest {
            50.0
        } else {
            100.0 * (bars[i].close - lowest) / (highest - lowest)
        };
    }

    let k = if smooth_k > 1 {
        sma(&raw_k, smooth_k)
    } else {
        raw_k
    };
    let d = sma(&k, d_period.max(1));

    StochasticResult { k, d }
}

/// Williams %R, in [-100, 0].
pub fn williams_r(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = nan_series(n);
    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let slice = &bars[i + 1 - period..=i];
        let highest = slice
            .iter()
            .map(|b| b.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let lowest = slice.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

        result[i] = if highest == lowest {
            -50.0
        } else {
            -100.0 * (highest - bars[i].close) / (highest - lowest)
        };
    }

    result
}

/// Commodity Channel Index (unbounded, 0.015 mean-deviation constant).
pub fn cci(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = nan_series(n);
    if period == 0 || n < period {
        return result;
    }

    let typical: Vec<f64> = bars.iter().map(|b| (b.high + b.low + b.close) / 3.0).collect();

    for i in (period - 1)..n {
        let window = &typical[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let mean_dev = window.iter().map(|t| (t - mean).abs()).sum::<f64>() / period as f64;

        result[i] = if mean_dev == 0.0 {
            0.0
        } else {
            (typical[i] - mean) / (0.015 * mean_dev)
        };
    }

    result
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(
    data: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdResult {
    let n = data.len();
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || slow_period < fast_period {
        return MacdResult {
            macd_line: nan_series(n),
            signal_line: nan_series(n),
            histogram: nan_series(n),
        };
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = ema(&macd_line, signal_period);

    let histogram: Vec<f64> = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| m - s)
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
    pub width: Vec<f64>,
}

pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let n = data.len();
    let middle = sma(data, period);
    let mut upper = nan_series(n);
    let mut lower = nan_series(n);
    let mut width = nan_series(n);

    if period == 0 || n < period {
        return BollingerBands {
            upper,
            middle,
            lower,
            width,
        };
    }

    for i in (period - 1)..n {
        let slice = &data[i + 1 - period..=i];
        let mean = middle[i];
        if mean.is_nan() {
            continue;
        }
        let variance: f64 = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();

        upper[i] = mean + std_dev * std;
        lower[i] = mean - std_dev * std;
        width[i] = if mean != 0.0 {
            (upper[i] - lower[i]) / mean
        } else {
            f64::NAN
        };
    }

    BollingerBands {
        upper,
        middle,
        lower,
        width,
    }
}

/// Average True Range (Wilder smoothing), non-negative.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = nan_series(n);
    if period == 0 || n < period + 1 {
        return result;
    }

    let tr = true_range(bars);

    // Seed over tr[1..=period]; tr[0] has no prior close and is excluded.
    let mut atr_val = tr[1..=period].iter().sum::<f64>() / period as f64;
    result[period] = atr_val;

    for i in (period + 1)..n {
        atr_val = (atr_val * (period - 1) as f64 + tr[i]) / period as f64;
        result[i] = atr_val;
    }

    result
}

/// Average Directional Index with +DI/-DI, all in [0, 100].
pub struct AdxResult {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

pub fn adx(bars: &[Bar], period: usize) -> AdxResult {
    let n = bars.len();
    let mut adx_out = nan_series(n);
    let mut plus_di = nan_series(n);
    let mut minus_di = nan_series(n);

    if period == 0 || n < period * 2 + 1 {
        return AdxResult {
            adx: adx_out,
            plus_di,
            minus_di,
        };
    }

    // +DM, -DM and TR per bar transition; index j describes bar j+1
    let mut plus_dm = Vec::with_capacity(n - 1);
    let mut minus_dm = Vec::with_capacity(n - 1);
    let mut tr = Vec::with_capacity(n - 1);

    for i in 1..n {
        let up_move = bars[i].high - bars[i - 1].high;
        let down_move = bars[i - 1].low - bars[i].low;

        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });

        let hl = bars[i].high - bars[i].low;
        let hc = (bars[i].high - bars[i - 1].close).abs();
        let lc = (bars[i].low - bars[i - 1].close).abs();
        tr.push(hl.max(hc).max(lc));
    }

    // Wilder's smoothed sums
    let mut smoothed_plus_dm = plus_dm[..period].iter().sum::<f64>();
    let mut smoothed_minus_dm = minus_dm[..period].iter().sum::<f64>();
    let mut smoothed_tr = tr[..period].iter().sum::<f64>();

    let mut dx_values: Vec<(usize, f64)> = Vec::new();

    for j in period..plus_dm.len() {
        smoothed_plus_dm = smoothed_plus_dm - smoothed_plus_dm / period as f64 + plus_dm[j];
        smoothed_minus_dm = smoothed_minus_dm - smoothed_minus_dm / period as f64 + minus_dm[j];
        smoothed_tr = smoothed_tr - smoothed_tr / period as f64 + tr[j];

        let pdi = if smoothed_tr > 0.0 {
            100.0 * smoothed_plus_dm / smoothed_tr
        } else {
            0.0
        };
        let mdi = if smoothed_tr > 0.0 {
            100.0 * smoothed_minus_dm / smoothed_tr
        } else {
            0.0
        };

        let bar = j + 1;
        plus_di[bar] = pdi;
        minus_di[bar] = mdi;

        let di_sum = pdi + mdi;
        let dx = if di_sum > 0.0 {
            100.0 * (pdi - mdi).abs() / di_sum
        } else {
            0.0
        };
        dx_values.push((bar, dx));
    }

    if dx_values.len() < period {
        return AdxResult {
            adx: adx_out,
            plus_di,
            minus_di,
        };
    }

    // Smooth DX into ADX
    let mut adx_val =
        dx_values[..period].iter().map(|(_, dx)| dx).sum::<f64>() / period as f64;
    adx_out[dx_values[period - 1].0] = adx_val;

    for &(bar, dx) in &dx_values[period..] {
        adx_val = (adx_val * (period - 1) as f64 + dx) / period as f64;
        adx_out[bar] = adx_val;
    }

    AdxResult {
        adx: adx_out,
        plus_di,
        minus_di,
    }
}

/// Supertrend state indicator.
pub struct SupertrendResult {
    pub value: Vec<f64>,
    /// +1 while trending up, -1 while trending down.
    pub direction: Vec<i8>,
}

/// Supertrend over ATR bands. The ATR here is a plain SMA of True Range with
/// min_periods 1, so the indicator is defined from bar 0; the dual-Supertrend
/// strategy relies on this sequence bit for bit.
pub fn supertrend(bars: &[Bar], period: usize, multiplier: f64) -> SupertrendResult {
    let n = bars.len();
    if n == 0 || period == 0 {
        return SupertrendResult {
            value: vec![],
            direction: vec![],
        };
    }

    let tr = true_range(bars);

    // SMA of TR with a growing window until `period` bars exist
    let mut atr_sma = Vec::with_capacity(n);
    let mut running = 0.0;
    for i in 0..n {
        running += tr[i];
        if i >= period {
            running -= tr[i - period];
        }
        let window = (i + 1).min(period);
        atr_sma.push(running / window as f64);
    }

    let mut upper_band = Vec::with_capacity(n);
    let mut lower_band = Vec::with_capacity(n);
    for (i, bar) in bars.iter().enumerate() {
        let hl2 = (bar.high + bar.low) / 2.0;
        upper_band.push(hl2 + multiplier * atr_sma[i]);
        lower_band.push(hl2 - multiplier * atr_sma[i]);
    }

    let mut value = Vec::with_capacity(n);
    let mut direction = Vec::with_capacity(n);
    direction.push(1i8);
    value.push(0.0);

    for i in 1..n {
        let dir = if bars[i].close > upper_band[i - 1] {
            1
        } else if bars[i].close < lower_band[i - 1] {
            -1
        } else {
            direction[i - 1]
        };
        direction.push(dir);
        value.push(if dir == 1 { lower_band[i] } else { upper_band[i] });
    }

    SupertrendResult { value, direction }
}
