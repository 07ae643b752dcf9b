//! Indian-style amount formatting (lakh / crore) and amounts in words.

pub const RUPEE: &str = "\u{20b9}";
pub const RUPEE_ASCII: &str = "Rs.";

const CRORE: f64 = 10_000_000.0;
const LAKH: f64 = 100_000.0;

const UNITS: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

/// Short form used by metrics and charts, e.g. `₹1.25 Cr`, `₹4.50 L`.
pub fn format_amount(value: f64, symbol: &str) -> String {
    if value < 0.0 {
        return format!("-{}", format_amount(-value, symbol));
    }

    if value >= CRORE {
        format!("{symbol}{:.2} Cr", value / CRORE)
    } else if value >= LAKH {
        format!("{symbol}{:.2} L", value / LAKH)
    } else {
        format!("{symbol}{value:.2}")
    }
}

/// Report form: the scaled amount followed by the full value in brackets.
pub fn format_amount_long(value: f64, symbol: &str) -> String {
    if value < 0.0 {
        return format!("-{}", format_amount_long(-value, symbol));
    }

    if value >= CRORE {
        format!("{symbol}{:.2} Crore ({value:.2})", value / CRORE)
    } else if value >= LAKH {
        format!("{symbol}{:.2} Lakh ({value:.2})", value / LAKH)
    } else {
        format!("{symbol}{value:.2}")
    }
}

/// Amount in words using the Indian numbering system, e.g.
/// `"One Lakh Twenty Thousand Rupees and Fifty Paise"`.
pub fn amount_in_words(amount: f64) -> String {
    if !amount.is_finite() {
        return "Not a finite amount".to_string();
    }
    if amount < 0.0 {
        return format!("Minus {}", amount_in_words(-amount));
    }

    let total_paise = (amount * 100.0).round() as u64;
    let rupees = total_paise / 100;
    let paise = total_paise % 100;

    let rupee_words = if rupees == 0 {
        "Zero".to_string()
    } else {
        integer_words(rupees)
    };

    if paise == 0 {
        format!("{rupee_words} Rupees")
    } else {
        format!("{rupee_words} Rupees and {} Paise", integer_words(paise))
    }
}

fn integer_words(n: u64) -> String {
    match n {
        0..=19 => UNITS[n as usize].to_string(),
        20..=99 => {
            let tens = TENS[(n / 10) as usize];
            match n % 10 {
                0 => tens.to_string(),
                unit => format!("{tens} {}", UNITS[unit as usize]),
            }
        }
        100..=999 => scaled(n, 100, "Hundred", " and "),
        1_000..=99_999 => scaled(n, 1_000, "Thousand", " "),
        100_000..=9_999_999 => scaled(n, 100_000, "Lakh", " "),
        _ => scaled(n, 10_000_000, "Crore", " "),
    }
}

fn scaled(n: u64, divisor: u64, unit: &str, separator: &str) -> String {
    let head = format!("{} {unit}", integer_words(n / divisor));
    match n % divisor {
        0 => head,
        rest => format!("{head}{separator}{}", integer_words(rest)),
    }
}
