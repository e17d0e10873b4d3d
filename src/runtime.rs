//! The fixed runtime prologue prepended to every compiled program.
//!
//! These routines are emitted verbatim before any user code. They share one
//! calling convention with compiled functions: arguments are pushed by the
//! caller in source order, results travel in `rax` (int), `rax`/`rbx`
//! (string address/length), or `rax`/`rbx`/`rcx` (slice address/length/
//! capacity), and `ret n` pops the argument bytes. Strings and slices live
//! in a fixed bump-allocated region with no reclamation.

/// Size in bytes of the emitted program's heap region.
pub const HEAP_SIZE: i64 = 1048576;

/// Entry point: zero the heap, run `main`, exit 0.
pub fn start_stub() -> String {
  format!(
    "_start:\n\
     xor rax, rax\n\
     mov rdi, _heap\n\
     mov rcx, {}\n\
     rep stosq\n\
     mov rax, _heap\n\
     mov [_heapPtr], rax\n\
     call main\n\
     mov rax, 60\n\
     mov rdi, 0\n\
     syscall\n",
    HEAP_SIZE / 8
  )
}

/// `print(s string)`: write to stdout. Stack at entry: rbp, ret, addr, len.
pub const PRINT: &str = "print:
push rbp
mov rbp, rsp
mov rax, 1
mov rdi, 1
mov rsi, [rbp+16]
mov rdx, [rbp+24]
syscall
pop rbp
ret 16
";

/// `log(s string)`: write to stderr.
pub const LOG: &str = "log:
push rbp
mov rbp, rsp
mov rax, 1
mov rdi, 2
mov rsi, [rbp+16]
mov rdx, [rbp+24]
syscall
pop rbp
ret 16
";

/// `getc() int`: read one byte from stdin, or -1 at EOF.
pub const GETC: &str = "getc:
push qword 0
mov rax, 0
mov rdi, 0
mov rsi, rsp
mov rdx, 1
syscall
cmp rax, 1
je _getc1
mov qword [rsp], -1
_getc1:
pop rax
ret
";

/// `exit(code int)`: terminate the process.
pub const EXIT: &str = "exit:
mov rdi, [rsp+8]
mov rax, 60
syscall
";

/// `int(n int) int`: identity, kept so sources can satisfy Go's checker.
pub const INT: &str = "int:
mov rax, [rsp+8]
ret 8
";

/// `_strAdd`: concatenate two strings into fresh heap memory.
/// Stack at entry: rbp, ret, addr1, len1, addr0, len0.
pub const STR_ADD: &str = "_strAdd:
push rbp
mov rbp, rsp
mov rax, [rbp+24]
add rax, [rbp+40]
push rax
call _alloc
mov rsi, [rbp+32]
mov rdi, rax
mov rcx, [rbp+40]
rep movsb
mov rsi, [rbp+16]
mov rdi, rax
add rdi, [rbp+40]
mov rcx, [rbp+24]
rep movsb
mov rbx, [rbp+24]
add rbx, [rbp+40]
pop rbp
ret 32
";

/// `_strEq`: 1 if length and bytes match, else 0.
pub const STR_EQ: &str = "_strEq:
push rbp
mov rbp, rsp
mov rcx, [rbp+40]
cmp rcx, [rbp+24]
jne _strEqNotEqual
mov rsi, [rbp+16]
mov rdi, [rbp+32]
rep cmpsb
jne _strEqNotEqual
mov rax, 1
pop rbp
ret 32
_strEqNotEqual:
xor rax, rax
pop rbp
ret 32
";

/// `char(ch int) string`: allocate a one-byte string.
pub const CHAR: &str = "char:
push rbp
mov rbp, rsp
push 1
call _alloc
mov rbx, [rbp+16]
mov [rax], bl
mov rbx, 1
pop rbp
ret 8
";

/// `_alloc(size int)`: bump allocator over the fixed heap region; logs and
/// exits when the region is exhausted.
pub const ALLOC: &str = "_alloc:
push rbp
mov rbp, rsp
mov rax, [_heapPtr]
mov rbx, [rbp+16]
add rbx, [_heapPtr]
cmp rbx, _heapEnd
jg _outOfMem
mov [_heapPtr], rbx
pop rbp
ret 8
_outOfMem:
push qword 14
push _strOutOfMem
call log
push qword 1
call exit
";

/// `_appendInt(s []int, v int) []int`: grow by doubling (minimum capacity
/// 1), copy, store. Stack at entry: rbp, ret, value, addr, len, cap.
pub const APPEND_INT: &str = "_appendInt:
push rbp
mov rbp, rsp
mov rax, [rbp+32]
mov rbx, [rbp+40]
cmp rax, rbx
jl _appendInt1
add rbx, rbx
jnz _appendInt2
inc rbx
_appendInt2:
mov [rbp+40], rbx
lea rbx, [rbx*8]
push rbx
call _alloc
mov rsi, [rbp+24]
mov rdi, rax
mov [rbp+24], rax
mov rcx, [rbp+32]
rep movsq
_appendInt1:
mov rax, [rbp+24]
mov rbx, [rbp+32]
mov rdx, [rbp+16]
mov [rax+rbx*8], rdx
inc rbx
mov rcx, [rbp+40]
pop rbp
ret 32
";

/// `_appendString(s []string, v string) []string`: same growth policy over
/// 16-byte elements. Stack at entry: rbp, ret, strAddr, strLen, addr, len,
/// cap.
pub const APPEND_STRING: &str = "_appendString:
push rbp
mov rbp, rsp
mov rax, [rbp+40]
mov rbx, [rbp+48]
cmp rax, rbx
jl _appendStr1
add rbx, rbx
jnz _appendStr2
inc rbx
_appendStr2:
mov [rbp+48], rbx
add rbx, rbx
lea rbx, [rbx*8]
push rbx
call _alloc
mov rsi, [rbp+32]
mov rdi, rax
mov [rbp+32], rax
mov rcx, [rbp+40]
add rcx, rcx
rep movsq
_appendStr1:
mov rax, [rbp+32]
mov rbx, [rbp+40]
add rbx, rbx
mov rdx, [rbp+16]
mov [rax+rbx*8], rdx
mov rdx, [rbp+24]
mov [rax+rbx*8+8], rdx
mov rbx, [rbp+40]
inc rbx
mov rcx, [rbp+48]
pop rbp
ret 40
";

/// `len(s string) int`.
pub const LEN: &str = "len:
push rbp
mov rbp, rsp
mov rax, [rbp+24]
pop rbp
ret 16
";

/// `_lenSlice(s []T) int`.
pub const LEN_SLICE: &str = "_lenSlice:
push rbp
mov rbp, rsp
mov rax, [rbp+24]
pop rbp
ret 24
";

/// Every prologue routine, in emission order (after the `_start` stub).
pub const HELPERS: &[&str] = &[
  PRINT,
  LOG,
  GETC,
  EXIT,
  INT,
  STR_ADD,
  STR_EQ,
  CHAR,
  ALLOC,
  APPEND_INT,
  APPEND_STRING,
  LEN,
  LEN_SLICE,
];
